fn main() -> Result<(), Box<dyn std::error::Error>> {
    tonic_build::configure()
        .file_descriptor_set_path(
            std::path::PathBuf::from(std::env::var("OUT_DIR")?).join("inference_descriptor.bin"),
        )
        .compile(&["proto/inference.proto"], &["proto"])?;
    Ok(())
}
