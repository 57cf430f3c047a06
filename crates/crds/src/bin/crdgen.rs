//! Prints the game-server CRD manifests as YAML.
//!
//! Usage: `cargo run -p crds --bin crdgen > deploy/crds.yaml`

use crds::Teamspeak;
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&Teamspeak::crd())?);
    Ok(())
}
