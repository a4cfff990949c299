fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let proto_file = "proto/ping.proto";
    let proto_dir = "proto";

    println!("cargo:rerun-if-changed={proto_file}");

    if !std::path::Path::new(proto_file).exists() {
        return Err(format!(
            "proto file not found at '{proto_file}' (cwd: {:?})",
            std::env::current_dir().unwrap_or_default(),
        )
        .into());
    }

    // Fall back to a vendored protoc when none is configured on the host.
    if std::env::var_os("PROTOC").is_none() {
        std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    }

    // The gateway reuses the generated message as its JSON body type.
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .type_attribute(
            ".ping.PingMessage",
            "#[derive(serde::Serialize, serde::Deserialize)]",
        )
        .field_attribute(".ping.PingMessage.greeting", "#[serde(default)]")
        .compile_protos(&[proto_file], &[proto_dir])?;

    Ok(())
}
