//! Prints the Installation CRD manifest for cluster registration.

use crds::Installation;
use kube::CustomResourceExt;

fn main() -> Result<(), serde_yaml::Error> {
    print!("---\n{}", serde_yaml::to_string(&Installation::crd())?);
    Ok(())
}
