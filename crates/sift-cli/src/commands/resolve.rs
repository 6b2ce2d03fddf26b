use sift_sync::Resolution;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::ResolveArgs;
use crate::context::AppContext;
use crate::output::output;

/// Handle `sift resolve`: the first provider that recognises the link wins.
pub async fn handle(args: &ResolveArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    for engine in &ctx.engines {
        let resolution = engine.resolve_url(&args.user, &args.url).await?;
        if resolution != Resolution::NotFound {
            return output(&resolution, flags.format);
        }
    }
    output(&Resolution::NotFound, flags.format)
}
