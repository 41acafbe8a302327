use std::env;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let target = env::var("TARGET").unwrap_or_default();
    let arch = env::var("CARGO_CFG_TARGET_ARCH").unwrap_or_default();

    // Host builds run the scheduler against simulated hardware
    if arch != "avr" {
        return;
    }

    if env::var("CARGO_FEATURE_ATMEGA328P").is_ok() {
        println!("cargo:rustc-link-arg=-mmcu=atmega328p");
    }

    println!("cargo:warning=Building {} for ATmega328P at 16MHz", target);
}
