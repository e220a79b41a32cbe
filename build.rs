fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // ESP-IDF sysenv is only needed when building against the real SDK;
    // host builds (tests, simulation) skip it.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
