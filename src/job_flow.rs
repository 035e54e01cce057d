//! Builds the cluster-API requests that run the map and reduce stages on a
//! managed Hadoop cluster.
//!
//! Submitting a job is two calls: `RunJobFlow` creates the cluster with a
//! debugging step, then `AddJobFlowSteps` adds one streaming step per input
//! prefix. This module only assembles the request bodies; they serialize
//! with the API's PascalCase field names.

use serde::{Deserialize, Serialize};

pub const AMI_VERSION: &str = "3.9.0";
pub const HADOOP_STREAMING_JAR: &str = "/home/hadoop/contrib/streaming/hadoop-streaming.jar";
pub const DEFAULT_JOB_FLOW_ROLE: &str = "EMR_EC2_DefaultRole";
pub const DEFAULT_SERVICE_ROLE: &str = "EMR_DefaultRole";
pub const JOB_FLOW_NAME: &str = "Log Processing Job";

/// Stands in for the id returned by `RunJobFlow` when none is known yet.
pub const JOB_FLOW_ID_PLACEHOLDER: &str = "${JOB_FLOW_ID}";

/////////////////////////////////////////////////////////////////////////////
// Job description
/////////////////////////////////////////////////////////////////////////////

/// A job as described in a JSON job file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobFlowConfig {
    #[serde(default = "default_region")]
    pub region: String,
    pub input_bucket: String,
    pub output_bucket: String,
    pub code_bucket: String,
    pub log_bucket: String,
    pub instances: InstanceOptions,
    /// Applied over every entry of `steps`.
    #[serde(default)]
    pub shared_step_args: StepArgs,
    pub steps: Vec<StepArgs>,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InstanceOptions {
    pub master_type: String,
    pub worker_type: String,
    pub worker_count: u32,
    pub ec2_key_name: String,
}

/// Per-step settings. Unset fields fall back to the defaults of
/// [`StepArgs::resolve`].
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StepArgs {
    pub name: Option<String>,
    pub action_on_failure: Option<ActionOnFailure>,
    pub mapper_filename: Option<String>,
    pub reducer_filename: Option<String>,
    pub mapper_prefix: Option<String>,
    pub reducer_prefix: Option<String>,
    pub input_prefix: Option<String>,
    pub output_prefix: Option<String>,
}

/// A step with every setting decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStep {
    pub name: String,
    pub action_on_failure: ActionOnFailure,
    pub mapper_filename: String,
    pub reducer_filename: String,
    pub mapper_prefix: String,
    pub reducer_prefix: String,
    pub input_prefix: String,
    pub output_prefix: String,
}

impl StepArgs {
    /// Overlay `shared` on these args. Fields set in `shared` win.
    pub fn merged_with(&self, shared: &StepArgs) -> StepArgs {
        fn pick<T: Clone>(own: &Option<T>, shared: &Option<T>) -> Option<T> {
            shared.clone().or_else(|| own.clone())
        }
        StepArgs {
            name: pick(&self.name, &shared.name),
            action_on_failure: pick(&self.action_on_failure, &shared.action_on_failure),
            mapper_filename: pick(&self.mapper_filename, &shared.mapper_filename),
            reducer_filename: pick(&self.reducer_filename, &shared.reducer_filename),
            mapper_prefix: pick(&self.mapper_prefix, &shared.mapper_prefix),
            reducer_prefix: pick(&self.reducer_prefix, &shared.reducer_prefix),
            input_prefix: pick(&self.input_prefix, &shared.input_prefix),
            output_prefix: pick(&self.output_prefix, &shared.output_prefix),
        }
    }

    /// Fill in defaults. Input and output prefixes have none.
    pub fn resolve(self, index: usize) -> Result<ResolvedStep, JobFlowError> {
        let missing = |field| JobFlowError::MissingStepField { index, field };
        Ok(ResolvedStep {
            name: self.name.unwrap_or_else(|| "Log Processing Step".to_string()),
            action_on_failure: self.action_on_failure.unwrap_or(ActionOnFailure::Continue),
            mapper_filename: self.mapper_filename.unwrap_or_else(|| "lf-map".to_string()),
            reducer_filename: self.reducer_filename.unwrap_or_else(|| "lf-reduce".to_string()),
            mapper_prefix: self.mapper_prefix.unwrap_or_else(|| "code/".to_string()),
            reducer_prefix: self.reducer_prefix.unwrap_or_else(|| "code/".to_string()),
            input_prefix: self.input_prefix.ok_or_else(|| missing("input_prefix"))?,
            output_prefix: self.output_prefix.ok_or_else(|| missing("output_prefix"))?,
        })
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum JobFlowError {
    #[error("step {index} has no `{field}`")]
    MissingStepField { index: usize, field: &'static str },
    #[error("the job defines no steps")]
    NoSteps,
}

/////////////////////////////////////////////////////////////////////////////
// Requests
/////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionOnFailure {
    TerminateJobFlow,
    TerminateCluster,
    CancelAndWait,
    Continue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Market {
    OnDemand,
    Spot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceRole {
    Master,
    Core,
    Task,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstanceGroup {
    pub name: String,
    pub market: Market,
    pub instance_role: InstanceRole,
    pub instance_type: String,
    pub instance_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Instances {
    pub instance_groups: Vec<InstanceGroup>,
    pub ec2_key_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct HadoopJarStep {
    pub jar: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StepConfig {
    pub name: String,
    pub action_on_failure: ActionOnFailure,
    pub hadoop_jar_step: HadoopJarStep,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RunJobFlowRequest {
    pub name: String,
    pub ami_version: String,
    pub instances: Instances,
    pub steps: Vec<StepConfig>,
    pub log_uri: String,
    pub job_flow_role: String,
    pub service_role: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AddJobFlowStepsRequest {
    pub job_flow_id: String,
    pub steps: Vec<StepConfig>,
}

/// Both requests of a submission, in the order they are sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SubmissionPlan {
    pub run_job_flow: RunJobFlowRequest,
    pub add_job_flow_steps: AddJobFlowStepsRequest,
}

/// Join an S3 bucket and path segments without doubling slashes.
pub fn s3_uri(bucket: &str, parts: &[&str]) -> String {
    let mut uri = format!("s3://{}", bucket.trim_matches('/'));
    for part in parts {
        let part = part.trim_matches('/');
        if !part.is_empty() {
            uri.push('/');
            uri.push_str(part);
        }
    }
    uri
}

impl JobFlowConfig {
    pub fn instances(&self) -> Instances {
        let o = &self.instances;
        Instances {
            instance_groups: vec![
                InstanceGroup {
                    name: "Master".to_string(),
                    market: Market::OnDemand,
                    instance_role: InstanceRole::Master,
                    instance_type: o.master_type.clone(),
                    instance_count: 1,
                },
                InstanceGroup {
                    name: "Workers".to_string(),
                    market: Market::OnDemand,
                    instance_role: InstanceRole::Core,
                    instance_type: o.worker_type.clone(),
                    instance_count: o.worker_count,
                },
            ],
            ec2_key_name: o.ec2_key_name.clone(),
        }
    }

    /// The first step of every cluster. It pushes task logs to the log
    /// bucket so failed steps can be inspected.
    pub fn debugging_step(&self) -> StepConfig {
        let libs = format!("s3://{}.elasticmapreduce/libs", self.region);
        StepConfig {
            name: "Setup Debugging".to_string(),
            action_on_failure: ActionOnFailure::TerminateCluster,
            hadoop_jar_step: HadoopJarStep {
                jar: format!("{libs}/script-runner/script-runner.jar"),
                args: vec![format!("{libs}/state-pusher/0.1/fetch")],
            },
        }
    }

    /// A Hadoop streaming step running the map and reduce binaries.
    pub fn streaming_step(&self, step: &ResolvedStep) -> StepConfig {
        let mapper = s3_uri(
            &self.code_bucket,
            &[step.mapper_prefix.as_str(), step.mapper_filename.as_str()],
        );
        let reducer = s3_uri(
            &self.code_bucket,
            &[step.reducer_prefix.as_str(), step.reducer_filename.as_str()],
        );
        StepConfig {
            name: step.name.clone(),
            action_on_failure: step.action_on_failure,
            hadoop_jar_step: HadoopJarStep {
                jar: HADOOP_STREAMING_JAR.to_string(),
                args: vec![
                    "-files".to_string(),
                    format!("{mapper},{reducer}"),
                    "-input".to_string(),
                    s3_uri(&self.input_bucket, &[step.input_prefix.as_str()]),
                    "-output".to_string(),
                    s3_uri(&self.output_bucket, &[step.output_prefix.as_str()]),
                    "-mapper".to_string(),
                    step.mapper_filename.clone(),
                    "-reducer".to_string(),
                    step.reducer_filename.clone(),
                ],
            },
        }
    }

    pub fn processing_steps(&self) -> Result<Vec<StepConfig>, JobFlowError> {
        if self.steps.is_empty() {
            return Err(JobFlowError::NoSteps);
        }
        self.steps
            .iter()
            .enumerate()
            .map(|(i, args)| {
                let step = args.merged_with(&self.shared_step_args).resolve(i)?;
                Ok(self.streaming_step(&step))
            })
            .collect()
    }

    pub fn run_job_flow_request(&self) -> RunJobFlowRequest {
        RunJobFlowRequest {
            name: JOB_FLOW_NAME.to_string(),
            ami_version: AMI_VERSION.to_string(),
            instances: self.instances(),
            steps: vec![self.debugging_step()],
            log_uri: format!("{}/", s3_uri(&self.log_bucket, &[])),
            job_flow_role: DEFAULT_JOB_FLOW_ROLE.to_string(),
            service_role: DEFAULT_SERVICE_ROLE.to_string(),
        }
    }

    /// Assemble both requests. Without a `job_flow_id` the steps request
    /// carries [`JOB_FLOW_ID_PLACEHOLDER`].
    pub fn plan(&self, job_flow_id: Option<&str>) -> Result<SubmissionPlan, JobFlowError> {
        Ok(SubmissionPlan {
            run_job_flow: self.run_job_flow_request(),
            add_job_flow_steps: AddJobFlowStepsRequest {
                job_flow_id: job_flow_id.unwrap_or(JOB_FLOW_ID_PLACEHOLDER).to_string(),
                steps: self.processing_steps()?,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> JobFlowConfig {
        serde_json::from_value(json!({
            "input_bucket": "log-bucket",
            "output_bucket": "job-result-bucket",
            "code_bucket": "source-code-bucket",
            "log_bucket": "debug-log-bucket",
            "instances": {
                "master_type": "m1.large",
                "worker_type": "m1.large",
                "worker_count": 5,
                "ec2_key_name": "mykey"
            },
            "steps": [
                {
                    "name": "Log Processing Job 1",
                    "input_prefix": "input/1/",
                    "output_prefix": "output/1/"
                },
                { "input_prefix": "input/2/", "output_prefix": "output/2/" }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn joins_s3_uris_without_double_slashes() {
        assert_eq!(s3_uri("bucket", &["code/", "lf-map"]), "s3://bucket/code/lf-map");
        assert_eq!(s3_uri("bucket/", &["/input/1/"]), "s3://bucket/input/1");
        assert_eq!(s3_uri("bucket", &[]), "s3://bucket");
    }

    #[test]
    fn cluster_request_starts_with_the_debugging_step() {
        let request = config().run_job_flow_request();
        assert_eq!(request.name, "Log Processing Job");
        assert_eq!(request.log_uri, "s3://debug-log-bucket/");
        assert_eq!(request.steps.len(), 1);
        assert_eq!(request.steps[0].action_on_failure, ActionOnFailure::TerminateCluster);
        assert_eq!(
            request.steps[0].hadoop_jar_step.jar,
            "s3://us-east-1.elasticmapreduce/libs/script-runner/script-runner.jar"
        );
        let groups = &request.instances.instance_groups;
        assert_eq!(groups[0].instance_count, 1);
        assert_eq!(groups[1].instance_role, InstanceRole::Core);
        assert_eq!(groups[1].instance_count, 5);
    }

    #[test]
    fn streaming_steps_use_defaults() {
        let steps = config().processing_steps().unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].name, "Log Processing Job 1");
        assert_eq!(steps[1].name, "Log Processing Step");
        assert_eq!(steps[1].action_on_failure, ActionOnFailure::Continue);
        assert_eq!(
            steps[1].hadoop_jar_step.args,
            vec![
                "-files",
                "s3://source-code-bucket/code/lf-map,s3://source-code-bucket/code/lf-reduce",
                "-input",
                "s3://log-bucket/input/2",
                "-output",
                "s3://job-result-bucket/output/2",
                "-mapper",
                "lf-map",
                "-reducer",
                "lf-reduce",
            ]
        );
    }

    #[test]
    fn shared_args_win_over_step_args() {
        let mut config = config();
        config.shared_step_args.action_on_failure = Some(ActionOnFailure::CancelAndWait);
        config.shared_step_args.name = Some("Nightly".to_string());
        let steps = config.processing_steps().unwrap();
        assert!(steps.iter().all(|s| s.name == "Nightly"));
        assert!(steps
            .iter()
            .all(|s| s.action_on_failure == ActionOnFailure::CancelAndWait));
    }

    #[test]
    fn steps_need_input_and_output_prefixes() {
        let mut config = config();
        config.steps[1].output_prefix = None;
        assert_eq!(
            config.processing_steps().unwrap_err(),
            JobFlowError::MissingStepField {
                index: 1,
                field: "output_prefix"
            }
        );

        config.steps.clear();
        assert_eq!(config.plan(None).unwrap_err(), JobFlowError::NoSteps);
    }

    #[test]
    fn plan_serializes_with_api_field_names() {
        let plan = config().plan(Some("j-123")).unwrap();
        let value = serde_json::to_value(&plan).unwrap();
        assert_eq!(value["RunJobFlow"]["AmiVersion"], "3.9.0");
        assert_eq!(value["RunJobFlow"]["JobFlowRole"], "EMR_EC2_DefaultRole");
        assert_eq!(
            value["RunJobFlow"]["Instances"]["InstanceGroups"][0]["Market"],
            "ON_DEMAND"
        );
        assert_eq!(value["AddJobFlowSteps"]["JobFlowId"], "j-123");
        assert_eq!(
            value["AddJobFlowSteps"]["Steps"][0]["HadoopJarStep"]["Jar"],
            HADOOP_STREAMING_JAR
        );

        let placeholder = config().plan(None).unwrap();
        assert_eq!(placeholder.add_job_flow_steps.job_flow_id, JOB_FLOW_ID_PLACEHOLDER);
    }
}
