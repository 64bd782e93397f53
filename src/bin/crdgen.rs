use disaster_recovery_daemon::crd::DisasterRecovery;
use kube::CustomResourceExt;

fn main() -> Result<(), serde_yaml::Error> {
    print!("{}", serde_yaml::to_string(&DisasterRecovery::crd())?);
    Ok(())
}
