// ABOUTME: Publish command implementation.
// ABOUTME: Builds the image once and pushes it under the commit's tag set.

use super::Invocation;
use crate::cli::ContextArgs;
use kedge::diagnostics::Diagnostics;
use kedge::error::Result;
use kedge::publish::{ImagePublisher, PublishSettings};

pub async fn publish(mut invocation: Invocation, context: &ContextArgs) -> Result<()> {
    let ctx = invocation.context(context)?;
    let settings = PublishSettings::from_config(&invocation.config, &ctx)?;

    invocation.output.start_timer();
    invocation.output.progress(&format!(
        "Publishing {} for {}",
        settings.repository,
        ctx.short_sha()
    ));

    let result = ImagePublisher::new(invocation.runner(), settings)
        .publish(&ctx)
        .await;
    invocation.finish(&Diagnostics::default());
    let image = result?;

    for reference in image.references() {
        invocation.output.progress(&format!("  → Pushed {}", reference));
    }
    invocation
        .output
        .success(&format!("Published {}", image.commit_reference()));
    Ok(())
}
