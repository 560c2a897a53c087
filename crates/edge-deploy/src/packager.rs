//! Deployment package assembly
//!
//! Builds the local deployment directory: environment file, import map,
//! one subdirectory per function with a copy of its entry point, and a
//! launcher script for the Supabase CLI. Pure file I/O, no network.
//!
//! Output layout:
//! ```text
//! supabase-deployment/
//! ├── .env.local
//! ├── import_map.json
//! ├── deploy-local.sh        (mode 0755)
//! ├── market-data/index.ts
//! ├── trading-signals/index.ts
//! └── portfolio-management/index.ts
//! ```

use anyhow::{Context, Result};
use serde_json::json;
use std::fs;
use std::path::Path;

use crate::config::Settings;
use crate::manifest::FunctionSpec;

/// Result of a packaging run
#[derive(Debug)]
pub struct PackageReport {
    /// Functions whose entry point was copied into the package
    pub copied: Vec<String>,

    /// Functions skipped because their entry point was missing
    pub skipped: Vec<String>,
}

impl PackageReport {
    /// A package with every function present is complete
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Assemble the deployment package under `settings.output_dir`.
///
/// A missing function source logs a warning and skips that function; it
/// never fails the packaging step. Prior contents at the same paths are
/// overwritten.
pub fn package(settings: &Settings, functions: &[FunctionSpec]) -> Result<PackageReport> {
    let out = &settings.output_dir;
    fs::create_dir_all(out)
        .with_context(|| format!("Failed to create output directory {:?}", out))?;

    write_env_file(settings, out)?;
    write_import_map(out)?;

    let mut copied = Vec::new();
    let mut skipped = Vec::new();

    for func in functions {
        let source = func.source_path(&settings.project_root);
        if !source.exists() {
            tracing::warn!("Function source not found, skipping: {:?}", source);
            skipped.push(func.name.clone());
            continue;
        }

        let func_dir = out.join(&func.name);
        fs::create_dir_all(&func_dir)
            .with_context(|| format!("Failed to create function directory {:?}", func_dir))?;
        fs::copy(&source, func_dir.join("index.ts"))
            .with_context(|| format!("Failed to copy {:?}", source))?;

        tracing::info!("Copied {}/index.ts", func.name);
        copied.push(func.name.clone());
    }

    write_launcher_script(out, functions)?;

    tracing::info!("Deployment package created at {:?}", out);
    Ok(PackageReport { copied, skipped })
}

/// Write `.env.local` with the four secrets/URLs the functions need.
fn write_env_file(settings: &Settings, out: &Path) -> Result<()> {
    let content = format!(
        "# Supabase Edge Functions environment variables\n\
         SUPABASE_URL={}\n\
         SUPABASE_ANON_KEY={}\n\
         SUPABASE_SERVICE_ROLE_KEY={}\n\
         FINNHUB_API_KEY={}\n",
        settings.supabase_url(),
        settings.anon_key,
        settings.service_role_key,
        settings.finnhub_api_key,
    );

    let path = out.join(".env.local");
    fs::write(&path, content)
        .with_context(|| format!("Failed to write {:?}", path))?;
    tracing::info!("Created .env.local");
    Ok(())
}

/// Write `import_map.json` mapping the two module aliases the function
/// runtime resolves at load time.
fn write_import_map(out: &Path) -> Result<()> {
    let import_map = json!({
        "imports": {
            "std/": "https://deno.land/std@0.168.0/",
            "supabase": "https://esm.sh/@supabase/supabase-js@2",
        }
    });

    let path = out.join("import_map.json");
    fs::write(&path, serde_json::to_string_pretty(&import_map)?)
        .with_context(|| format!("Failed to write {:?}", path))?;
    tracing::info!("Created import_map.json");
    Ok(())
}

/// Write the `deploy-local.sh` launcher and mark it executable.
fn write_launcher_script(out: &Path, functions: &[FunctionSpec]) -> Result<()> {
    let mut script = String::from(
        "#!/bin/bash\n\
         # Supabase Edge Functions local deployment\n\
         \n\
         echo \"Deploying Edge Functions locally...\"\n\
         \n\
         # Start the local development stack, then serve the functions\n\
         supabase start\n\
         supabase functions serve --env-file .env.local\n\
         \n\
         echo \"Edge Functions are now running locally!\"\n\
         echo \"Test URLs:\"\n",
    );
    for func in functions {
        script.push_str(&format!(
            "echo \"  - http://localhost:54321/functions/v1/{}\"\n",
            func.name
        ));
    }

    let path = out.join("deploy-local.sh");
    fs::write(&path, script)
        .with_context(|| format!("Failed to write {:?}", path))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
            .with_context(|| format!("Failed to set permissions on {:?}", path))?;
    }

    tracing::info!("Created deploy-local.sh");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::default_manifest;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn settings_for(root: &Path) -> Settings {
        Settings {
            project_id: "testproject".to_string(),
            anon_key: "anon-key".to_string(),
            service_role_key: "service-key".to_string(),
            finnhub_api_key: "finnhub-key".to_string(),
            db_host: "db.example.com".to_string(),
            functions_url: None,
            project_root: root.to_path_buf(),
            output_dir: root.join("supabase-deployment"),
        }
    }

    fn write_source(root: &Path, name: &str) {
        let dir = root.join("supabase").join("functions").join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("index.ts"), format!("// {}\n", name)).unwrap();
    }

    #[test]
    fn test_package_full_tree() {
        let tmp = TempDir::new().unwrap();
        let functions = default_manifest();
        for func in &functions {
            write_source(tmp.path(), &func.name);
        }

        let settings = settings_for(tmp.path());
        let report = package(&settings, &functions).unwrap();

        assert!(report.is_complete());
        assert_eq!(report.copied.len(), 3);

        let out = &settings.output_dir;
        assert!(out.join(".env.local").exists());
        assert!(out.join("import_map.json").exists());
        assert!(out.join("deploy-local.sh").exists());
        for func in &functions {
            let copy = out.join(&func.name).join("index.ts");
            assert_eq!(
                fs::read_to_string(copy).unwrap(),
                format!("// {}\n", func.name)
            );
        }
    }

    #[test]
    fn test_env_file_contents() {
        let tmp = TempDir::new().unwrap();
        let settings = settings_for(tmp.path());
        package(&settings, &[]).unwrap();

        let content =
            fs::read_to_string(settings.output_dir.join(".env.local")).unwrap();
        let pairs: Vec<&str> = content
            .lines()
            .filter(|l| !l.starts_with('#') && !l.is_empty())
            .collect();

        assert_eq!(
            pairs,
            vec![
                "SUPABASE_URL=https://testproject.supabase.co",
                "SUPABASE_ANON_KEY=anon-key",
                "SUPABASE_SERVICE_ROLE_KEY=service-key",
                "FINNHUB_API_KEY=finnhub-key",
            ]
        );
    }

    #[test]
    fn test_import_map_is_valid_json() {
        let tmp = TempDir::new().unwrap();
        let settings = settings_for(tmp.path());
        package(&settings, &[]).unwrap();

        let content =
            fs::read_to_string(settings.output_dir.join("import_map.json")).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        let imports = parsed["imports"].as_object().unwrap();

        assert_eq!(imports.len(), 2);
        assert_eq!(imports["std/"], "https://deno.land/std@0.168.0/");
        assert_eq!(imports["supabase"], "https://esm.sh/@supabase/supabase-js@2");
    }

    #[test]
    fn test_missing_source_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let functions = default_manifest();
        // Only the first two functions have sources on disk
        write_source(tmp.path(), &functions[0].name);
        write_source(tmp.path(), &functions[1].name);

        let settings = settings_for(tmp.path());
        let report = package(&settings, &functions).unwrap();

        assert!(!report.is_complete());
        assert_eq!(report.copied, vec!["market-data", "trading-signals"]);
        assert_eq!(report.skipped, vec!["portfolio-management"]);
        assert!(!settings.output_dir.join("portfolio-management").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_launcher_script_is_executable() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let settings = settings_for(tmp.path());
        package(&settings, &default_manifest()).unwrap();

        let script = settings.output_dir.join("deploy-local.sh");
        let mode = fs::metadata(&script).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);

        let content = fs::read_to_string(&script).unwrap();
        assert!(content.starts_with("#!/bin/bash"));
        assert!(content.contains("supabase functions serve --env-file .env.local"));
        assert!(content.contains("http://localhost:54321/functions/v1/market-data"));
    }

    #[test]
    fn test_package_overwrites_previous_run() {
        let tmp = TempDir::new().unwrap();
        let functions = default_manifest();
        write_source(tmp.path(), &functions[0].name);

        let settings = settings_for(tmp.path());
        package(&settings, &functions).unwrap();

        // Change the source and repackage; the copy must be refreshed
        let source = functions[0].source_path(tmp.path());
        fs::write(&source, "// updated\n").unwrap();
        package(&settings, &functions).unwrap();

        let copy: PathBuf = settings.output_dir.join("market-data").join("index.ts");
        assert_eq!(fs::read_to_string(copy).unwrap(), "// updated\n");
    }
}
