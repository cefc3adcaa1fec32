use crate::layer::{resolve_first, Layer};
use crate::reference::{
    decode_reference, extract_release_key, match_org_tag, org_from_repo_location,
    spk_from_reference, spk_from_release_components, spk_from_release_name,
};
use crate::upstream::{UpstreamError, UpstreamResult};
use crate::xlr::{declared_variables, Release, ReleaseApi, Variables};
use serde::Serialize;

/// Identifiers derived from one release-train reference. Every field is
/// optional; a missing `spk` stops the discovery pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReleaseMetadata {
    pub release_key: Option<String>,
    pub spk: Option<String>,
    pub org_tag: Option<String>,
    pub folder_id: Option<String>,
}

struct MetaContext<'a> {
    api: &'a dyn ReleaseApi,
    reference: &'a str,
    release: Option<&'a Release>,
    variables: &'a Variables,
}

// ---------------------------------------------------------------------------
// SPK layers
// ---------------------------------------------------------------------------

fn spk_release_components(ctx: &MetaContext) -> UpstreamResult<Option<String>> {
    Ok(ctx
        .variables
        .text("releaseComponents")
        .and_then(|v| spk_from_release_components(&v)))
}

fn spk_release_name(ctx: &MetaContext) -> UpstreamResult<Option<String>> {
    Ok(ctx
        .variables
        .text("releaseName")
        .and_then(|v| spk_from_release_name(&v)))
}

fn spk_reference(ctx: &MetaContext) -> UpstreamResult<Option<String>> {
    Ok(spk_from_reference(ctx.reference))
}

// ---------------------------------------------------------------------------
// Organization tag layers
// ---------------------------------------------------------------------------

fn org_repo_location(ctx: &MetaContext) -> UpstreamResult<Option<String>> {
    Ok(ctx
        .variables
        .text("releaseConfigRepoLocation")
        .and_then(|v| org_from_repo_location(&v)))
}

fn org_folder_variable(ctx: &MetaContext) -> UpstreamResult<Option<String>> {
    let Some(folder_id) = ctx.variables.text("folderID") else {
        return Ok(None);
    };
    let folder = ctx.api.folder(folder_id.trim())?;
    Ok(match_org_tag(&folder.title))
}

fn org_release_folder(ctx: &MetaContext) -> UpstreamResult<Option<String>> {
    Ok(ctx
        .release
        .and_then(|r| r.folder.as_ref())
        .and_then(|f| match_org_tag(&f.path)))
}

fn org_reference(ctx: &MetaContext) -> UpstreamResult<Option<String>> {
    Ok(match_org_tag(ctx.reference))
}

/// Resolve release key, SPK and organization tag for `reference`.
///
/// Layers that fail upstream are skipped. A transport or schema failure on
/// the release document itself clears every field. Only timeouts are
/// returned as errors.
pub fn extract_release_metadata(
    api: &dyn ReleaseApi,
    reference: &str,
) -> UpstreamResult<ReleaseMetadata> {
    let decoded = decode_reference(reference);
    let key = extract_release_key(&decoded);

    let release = match api.release(&key) {
        Ok(release) => Some(release),
        Err(e) if e.is_timeout() => return Err(e),
        Err(e @ UpstreamError::Status { .. }) => {
            tracing::warn!(key = %key, error = %e, "release lookup rejected, using reference patterns");
            None
        }
        Err(e) => {
            tracing::error!(key = %key, error = %e, "release lookup failed");
            return Ok(ReleaseMetadata::default());
        }
    };
    let variables = match &release {
        Some(r) => declared_variables(api, &key, r)?,
        None => Variables::default(),
    };

    let ctx = MetaContext {
        api,
        reference: &decoded,
        release: release.as_ref(),
        variables: &variables,
    };

    let spk_layers: [Layer<MetaContext, String>; 3] = [
        Layer {
            id: "release-components-variable",
            resolve: spk_release_components,
        },
        Layer {
            id: "release-name-variable",
            resolve: spk_release_name,
        },
        Layer {
            id: "reference-spk-pattern",
            resolve: spk_reference,
        },
    ];
    let org_layers: [Layer<MetaContext, String>; 4] = [
        Layer {
            id: "repo-location-variable",
            resolve: org_repo_location,
        },
        Layer {
            id: "folder-variable",
            resolve: org_folder_variable,
        },
        Layer {
            id: "release-folder-path",
            resolve: org_release_folder,
        },
        Layer {
            id: "reference-org-pattern",
            resolve: org_reference,
        },
    ];

    let spk = resolve_first(&spk_layers, &ctx)?;
    let org_tag = resolve_first(&org_layers, &ctx)?;
    if spk.is_none() {
        tracing::warn!(reference = %decoded, "no SPK in release or reference");
    }

    Ok(ReleaseMetadata {
        release_key: Some(key),
        spk,
        org_tag,
        folder_id: variables.text("folderID"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{Failure, FakeReleaseApi};
    use crate::xlr::ReleaseFolder;

    const REF: &str = "https://xlr.example/#/releases/Folder1-Release42/relationships/table";

    fn release() -> Release {
        Release {
            id: "Release42".into(),
            ..Release::default()
        }
    }

    #[test]
    fn variables_supply_spk_and_org() {
        let api = FakeReleaseApi::new()
            .with_release("Release42", release())
            .with_variables(
                "Release42",
                &[
                    ("releaseComponents", "CODECTS svcA svcB"),
                    ("releaseConfigRepoLocation", "CODECTS@apps_team_vgpdr_bh@1/CODECTS"),
                ],
            );
        let meta = extract_release_metadata(&api, REF).unwrap();
        assert_eq!(meta.release_key.as_deref(), Some("Release42"));
        assert_eq!(meta.spk.as_deref(), Some("CODECTS"));
        assert_eq!(meta.org_tag.as_deref(), Some("VGPDR---BH"));
    }

    #[test]
    fn placeholder_spk_falls_through_to_release_name() {
        let api = FakeReleaseApi::new()
            .with_release("Release42", release())
            .with_variables(
                "Release42",
                &[
                    ("releaseComponents", "SPK_PROD svcA"),
                    ("releaseName", "WMTO-PAYHUB-2025.03"),
                ],
            );
        let meta = extract_release_metadata(&api, REF).unwrap();
        assert_eq!(meta.spk.as_deref(), Some("PAYHUB"));
    }

    #[test]
    fn folder_variable_resolves_org_through_lookup() {
        let api = FakeReleaseApi::new()
            .with_release("Release42", release())
            .with_variables("Release42", &[("releaseName", "CODECTS"), ("folderID", "Folder7")])
            .with_folder("Folder7", "Trains VGPDR---BH");
        let meta = extract_release_metadata(&api, REF).unwrap();
        assert_eq!(meta.org_tag.as_deref(), Some("VGPDR---BH"));
        assert_eq!(meta.folder_id.as_deref(), Some("Folder7"));
    }

    #[test]
    fn failed_folder_lookup_falls_back_to_release_folder_path() {
        let mut r = release();
        r.folder = Some(ReleaseFolder {
            path: "Applications/ABCDE---FG/Trains".into(),
        });
        let api = FakeReleaseApi::new()
            .with_release("Release42", r)
            .with_variables("Release42", &[("folderID", "Folder7")])
            .failing("folder:Folder7", Failure::Status(500));
        let meta = extract_release_metadata(&api, REF).unwrap();
        assert_eq!(meta.org_tag.as_deref(), Some("ABCDE---FG"));
    }

    #[test]
    fn rejected_release_uses_reference_patterns() {
        let api = FakeReleaseApi::new();
        let meta = extract_release_metadata(
            &api,
            "https://xlr.example/#/releases/SPK204-VGPDR---BH-Release9",
        )
        .unwrap();
        assert_eq!(meta.release_key.as_deref(), Some("Release9"));
        assert_eq!(meta.spk.as_deref(), Some("SPK204"));
        assert_eq!(meta.org_tag.as_deref(), Some("VGPDR---BH"));
    }

    #[test]
    fn transport_failure_clears_every_field() {
        let api = FakeReleaseApi::new().failing("release:Release42", Failure::Transport);
        let meta = extract_release_metadata(&api, REF).unwrap();
        assert_eq!(meta, ReleaseMetadata::default());
    }

    #[test]
    fn timeout_is_returned() {
        let api = FakeReleaseApi::new()
            .with_release("Release42", release())
            .failing("variables:Release42", Failure::Timeout);
        assert!(extract_release_metadata(&api, REF).unwrap_err().is_timeout());
    }
}
