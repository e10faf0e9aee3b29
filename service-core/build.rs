use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let proto_root = PathBuf::from("../proto");

    println!("cargo:rerun-if-changed=../proto/micros/order/v1/");

    // Bill item service protos (client-side only)
    tonic_build::configure()
        .build_server(false)
        .build_client(true)
        .compile_protos(&["../proto/micros/order/v1/bill_item.proto"], &[&proto_root])?;

    Ok(())
}
