fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Compile protobuf definitions.
    //
    // Server stubs are kept since the integration tests emulate a device.
    tonic_prost_build::configure().compile_protos(
        &[
            "../proto/gnsi/certz.proto",
            "../proto/gnmi.proto",
            "../proto/gnoi/system.proto",
            "../proto/gribi.proto",
            "../proto/p4/p4runtime.proto",
        ],
        &["../proto"],
    )?;

    Ok(())
}
