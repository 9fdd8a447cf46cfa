use serde::Serialize;

use schedbench_topology::{ClusterAddressing, ClusterPlan, ClusterRequest, encode, plan as plan_cluster};

use super::{HarnessArgs, InputArgs};

/// Everything a dry run prints for one scenario.
#[derive(Debug, Serialize)]
pub struct DryRun<'a> {
    pub scenario: &'a str,
    pub request: ClusterRequest,
    pub plan: ClusterPlan,
    pub addressing: ClusterAddressing,
}

pub async fn plan(inputs: &InputArgs, scenario: &str, harness: &HarnessArgs) -> anyhow::Result<()> {
    let settings = harness.settings()?;
    let config = inputs.load_config(&settings)?;
    let hosts = inputs.load_hosts(&settings).await?;

    let request = ClusterRequest::from_scenario(config.scenario(scenario)?);
    let plan = plan_cluster(&request, &hosts)?;
    let addressing = encode(&plan);

    let dry_run = DryRun {
        scenario,
        request,
        plan,
        addressing,
    };
    println!("{}", serde_json::to_string_pretty(&dry_run)?);
    Ok(())
}
