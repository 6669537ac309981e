//! # CRD Generator
//!
//! Prints the `InstallationAccessToken` CustomResourceDefinition as YAML.
//!
//! ```bash
//! cargo run --bin crdgen > config/crd/installationaccesstoken.yaml
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use installation_token_controller::crd::InstallationAccessToken;
use kube::core::CustomResourceExt;

fn main() {
    let crd = InstallationAccessToken::crd();

    match serde_yaml::to_string(&crd) {
        Ok(yaml) => {
            println!("# This file is auto-generated by crdgen");
            println!("# DO NOT EDIT THIS FILE MANUALLY");
            println!("# Change the Rust types in src/crd/ and regenerate instead");
            println!("#");
            println!("---");
            print!("{yaml}");
        }
        Err(e) => {
            eprintln!("Failed to serialize CRD to YAML: {e}");
            std::process::exit(1);
        }
    }
}
