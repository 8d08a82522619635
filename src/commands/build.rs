use crate::bundle::Bundle;
use crate::commands::{merge_sources, merge_stdin, warn_duplicates, Context, Outcome};
use crate::domain::constants::{EXPERIMENTAL_ENV, OCI_DEFAULT_TAG};
use crate::domain::models::BuildReport;
use crate::services::oci::build_image;
use crate::services::output::print_json;
use crate::services::writers::{write_compressed_archive, write_fs, write_yaml, DirFs, MemFs};
use anyhow::Context as _;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};

/// Optional artifacts written next to the YAML on stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuildTargets<'a> {
    pub archive: Option<&'a Path>,
    pub output_dir: Option<&'a Path>,
    pub build_oci: Option<&'a Path>,
}

pub fn handle_build(
    ctx: &Context,
    policies: &[String],
    targets: BuildTargets<'_>,
) -> anyhow::Result<Outcome> {
    let BuildTargets {
        archive,
        output_dir,
        build_oci,
    } = targets;
    if build_oci.is_some() && std::env::var_os(EXPERIMENTAL_ENV).is_none() {
        anyhow::bail!(
            "--build-oci is experimental; set {}=1 to enable it",
            EXPERIMENTAL_ENV
        );
    }

    let mut bundle = Bundle::new();
    merge_stdin(ctx, &mut bundle)?;
    merge_sources(ctx, policies, &mut bundle)?;
    warn_duplicates(&bundle);
    if bundle.is_empty() {
        warn!("no policies found in any source");
    }
    info!(
        templates = bundle.templates().len(),
        constraints = bundle.constraints().len(),
        "built bundle"
    );

    let yaml = write_yaml(&bundle);

    if let Some(path) = archive {
        let file = File::create(path)
            .with_context(|| format!("failed to create archive {}", path.display()))?;
        let mut w = BufWriter::new(file);
        write_compressed_archive(&bundle, &ctx.config.bundle.file_name, &mut w)
            .with_context(|| format!("failed to write archive {}", path.display()))?;
        w.flush()?;
        info!(path = %path.display(), "wrote archive");
    }

    let mut written = None;
    if let Some(root) = output_dir {
        let mut fsys = DirFs::new(root);
        let rel = write_fs(
            &bundle,
            &mut fsys,
            &ctx.config.bundle.base_dir,
            &ctx.config.bundle.file_name,
        )
        .with_context(|| format!("failed to write bundle under {}", root.display()))?;
        let path = root.join(rel);
        info!(path = %path.display(), "wrote bundle file");
        written = Some(path.display().to_string());
    }

    let mut oci_manifest_digest = None;
    if let Some(layout) = build_oci {
        let mut fsys = MemFs::new();
        write_fs(
            &bundle,
            &mut fsys,
            &ctx.config.bundle.base_dir,
            &ctx.config.bundle.file_name,
        )?;
        std::fs::create_dir_all(layout)
            .with_context(|| format!("failed to create {}", layout.display()))?;
        let desc = build_image(&fsys, layout, OCI_DEFAULT_TAG)
            .with_context(|| format!("failed to build oci layout {}", layout.display()))?;
        oci_manifest_digest = Some(desc.digest);
    }

    if ctx.json {
        print_json(
            true,
            BuildReport {
                templates: bundle.templates().len(),
                constraints: bundle.constraints().len(),
                yaml: String::from_utf8_lossy(&yaml).into_owned(),
                archive: archive.map(|p| p.display().to_string()),
                file: written,
                oci_manifest_digest,
            },
        )?;
    } else {
        let mut out = std::io::stdout().lock();
        out.write_all(&yaml)?;
        out.flush()?;
    }
    Ok(Outcome::Success)
}
