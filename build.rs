fn main() {
    // Build-time beacon configuration (see `BeaconConfig::from_build_env`).
    for var in [
        "BTHOME_DEVICE_NAME",
        "BTHOME_BUTTON_COUNT",
        "BTHOME_ENCRYPTION_KEY",
        "BTHOME_BATTERY_LEVEL",
        "BTHOME_BATTERY_VOLTAGE",
        "BTHOME_ADV_TIMEOUT",
        "BTHOME_ADV_PACKETS",
    ] {
        println!("cargo:rerun-if-env-changed={var}");
    }

    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
