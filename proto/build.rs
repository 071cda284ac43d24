fn main() -> Result<(), Box<dyn std::error::Error>> {
    let proto_files = ["../protos/iot_readings.proto"];

    // Use the vendored protoc (and its well-known types) unless the caller
    // already points at one.
    if std::env::var_os("PROTOC").is_none() {
        std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    }
    let include_dirs = [
        std::path::PathBuf::from("../protos"),
        protoc_bin_vendored::include_path()?,
    ];

    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&proto_files, &include_dirs)?;

    for file in proto_files {
        println!("cargo:rerun-if-changed={file}");
    }

    Ok(())
}
