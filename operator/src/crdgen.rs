use kube::CustomResourceExt;

fn main() {
    println!("---");
    print!("{}", serde_yaml::to_string(&common::Cluster::crd()).unwrap());
    println!("---");
    print!("{}", serde_yaml::to_string(&common::OverridePolicy::crd()).unwrap());
}
