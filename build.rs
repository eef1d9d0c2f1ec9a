fn main() {
    // Device builds need the ESP-IDF linker arguments; host builds need nothing.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
