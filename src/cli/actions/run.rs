use super::{bootstrap, Action};
use anyhow::Result;

pub(super) async fn execute(action: Action) -> Result<()> {
    match action {
        Action::Bootstrap(args) => bootstrap::execute(args).await,
    }
}
