// ABOUTME: Property tests for job gating on the default pipeline.
// ABOUTME: Checks which branches and events trigger lint, test, build and deploys.

use kedge::config::{Config, template_yaml};
use kedge::context::{PipelineContext, PipelineSource};
use kedge::types::ResourceName;
use proptest::prelude::*;

const SHA: &str = "abc123def4567890abc123def4567890abc123de";

fn config() -> Config {
    Config::from_yaml(&template_yaml(&ResourceName::new("shop").unwrap())).unwrap()
}

fn planned(config: &Config, ctx: &PipelineContext) -> Vec<String> {
    let pipeline = config.pipeline().unwrap();
    pipeline
        .plan(ctx)
        .job_names()
        .into_iter()
        .map(String::from)
        .collect()
}

fn non_mr_source() -> impl Strategy<Value = PipelineSource> {
    prop_oneof![
        Just(PipelineSource::Push),
        Just(PipelineSource::Web),
        Just(PipelineSource::Schedule),
        Just(PipelineSource::Trigger),
        Just(PipelineSource::Api),
    ]
}

proptest! {
    #[test]
    fn feature_branches_trigger_nothing(
        branch in "[a-z][a-z0-9/_.-]{0,30}",
        source in non_mr_source(),
    ) {
        prop_assume!(!["main", "development", "production"].contains(&branch.as_str()));

        let ctx = PipelineContext::builder(SHA, branch)
            .source(source)
            .default_branch("main")
            .build()
            .unwrap();
        let jobs = planned(&config(), &ctx);

        for job in ["lint", "test", "build"] {
            prop_assert!(!jobs.iter().any(|j| j == job), "{} ran: {:?}", job, jobs);
        }
    }

    #[test]
    fn merge_requests_always_lint_test_and_build(branch in "[a-z][a-z0-9/_-]{0,30}") {
        let ctx = PipelineContext::builder(SHA, branch)
            .source(PipelineSource::MergeRequestEvent)
            .default_branch("main")
            .build()
            .unwrap();
        let jobs = planned(&config(), &ctx);

        prop_assert_eq!(&jobs[..3], &["lint", "test", "build"]);
    }

    #[test]
    fn production_deploy_is_always_manual(
        branch in prop_oneof![Just("main".to_string()), Just("production".to_string())],
        source in non_mr_source(),
    ) {
        let config = config();
        let ctx = PipelineContext::builder(SHA, branch)
            .source(source)
            .default_branch("main")
            .build()
            .unwrap();
        let pipeline = config.pipeline().unwrap();
        let plan = pipeline.plan(&ctx);

        let deploy = plan.jobs().find(|j| j.name == "deploy-prod");
        prop_assert!(deploy.is_some());
        prop_assert!(deploy.unwrap().is_manual());
    }
}

#[test]
fn integration_branches_run_lint_test_build() {
    let config = config();
    for branch in ["main", "development", "production"] {
        let ctx = PipelineContext::builder(SHA, branch).build().unwrap();
        let jobs = planned(&config, &ctx);
        assert_eq!(&jobs[..3], &["lint", "test", "build"], "branch {branch}");
    }
}

#[test]
fn deploy_dev_only_on_development() {
    let config = config();

    let dev = PipelineContext::builder(SHA, "development").build().unwrap();
    assert!(planned(&config, &dev).contains(&"deploy-dev".to_string()));

    let main = PipelineContext::builder(SHA, "main").build().unwrap();
    assert!(!planned(&config, &main).contains(&"deploy-dev".to_string()));
}

#[test]
fn custom_default_branch_counts_as_integration_branch() {
    let ctx = PipelineContext::builder(SHA, "trunk")
        .default_branch("trunk")
        .build()
        .unwrap();
    let jobs = planned(&config(), &ctx);
    assert!(jobs.contains(&"build".to_string()));
    assert!(jobs.contains(&"deploy-prod".to_string()));
}
