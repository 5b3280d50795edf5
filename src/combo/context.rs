//! The active build context and its on-disk pointer file.
//!
//! Activation is last-writer-wins: the pointer file always names the most
//! recently activated build directory so that later, independent invocations
//! can find it without re-deriving the combo. Single-writer operation per
//! repository is a caller responsibility; concurrent pipelines racing on the
//! pointer are unsupported.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::combo::BuildCombo;
use crate::error::Result;
use crate::layout::RepoLayout;

/// A resolved combo plus the build directory it addresses. Threaded through
/// every later stage instead of being re-read from global state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildContext {
    pub combo: BuildCombo,
    pub build_dir: PathBuf,
}

/// Create the combo's build directory (idempotent) and rewrite the pointer
/// file to reference it. Failure to create the directory is fatal.
pub fn activate(layout: &RepoLayout, combo: &BuildCombo) -> Result<BuildContext> {
    let build_dir = layout.build.join(combo.dir_name());
    fs::create_dir_all(&build_dir)?;

    let context = BuildContext {
        combo: combo.clone(),
        build_dir,
    };

    // Atomic rewrite: a reader never observes a partially written pointer.
    let pointer = layout.active_pointer();
    let staged = pointer.with_extension("json.tmp");
    fs::write(&staged, serde_json::to_vec_pretty(&context)?)?;
    fs::rename(&staged, &pointer)?;

    tracing::info!("Activated {}", context.combo.dir_name());
    Ok(context)
}

/// Read the most recently activated context, if any run has activated one.
pub fn load_active(layout: &RepoLayout) -> Result<Option<BuildContext>> {
    let pointer = layout.active_pointer();
    let bytes = match fs::read(&pointer) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    Ok(Some(serde_json::from_slice(&bytes)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combo::ComboRequest;

    fn scratch_layout() -> (tempfile::TempDir, RepoLayout) {
        let temp = tempfile::tempdir().unwrap();
        let layout = RepoLayout::from_root(temp.path().to_path_buf());
        (temp, layout)
    }

    fn combo(alias: &str) -> BuildCombo {
        BuildCombo::resolve(&ComboRequest {
            alias: Some(alias.to_string()),
            ..ComboRequest::new()
        })
        .unwrap()
    }

    #[test]
    fn activation_is_idempotent() {
        let (_temp, layout) = scratch_layout();
        let combo = combo("linux");

        let first = activate(&layout, &combo).unwrap();
        let second = activate(&layout, &combo).unwrap();
        assert_eq!(first, second);
        assert!(first.build_dir.is_dir());
        assert_eq!(load_active(&layout).unwrap().unwrap(), second);
    }

    #[test]
    fn pointer_is_last_writer_wins() {
        let (_temp, layout) = scratch_layout();

        activate(&layout, &combo("linux")).unwrap();
        let web = activate(&layout, &combo("web")).unwrap();

        let active = load_active(&layout).unwrap().unwrap();
        assert_eq!(active, web);
        // The earlier build directory is untouched, only the pointer moved.
        assert!(layout.build.join(combo("linux").dir_name()).is_dir());
    }

    #[test]
    fn no_pointer_means_no_active_context() {
        let (_temp, layout) = scratch_layout();
        fs::create_dir_all(&layout.build).unwrap();
        assert!(load_active(&layout).unwrap().is_none());
    }
}
