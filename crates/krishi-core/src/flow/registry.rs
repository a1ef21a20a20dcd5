//! Flow registry — name → definition, filled at startup and read-only after.
//!
//! Built-in advisory flows ship as YAML inside the crate; additional flows
//! can be loaded from a directory of `.yaml`/`.yml` files.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::FlowError;
use crate::flow::definition::FlowDefinition;

const BUILTIN_FLOWS: &[(&str, &str)] = &[
    ("suggest_optimal_crops.yaml", include_str!("../../flows/suggest_optimal_crops.yaml")),
    ("calculate_irrigation_schedule.yaml", include_str!("../../flows/calculate_irrigation_schedule.yaml")),
    ("predict_yield.yaml", include_str!("../../flows/predict_yield.yaml")),
    ("find_govt_schemes.yaml", include_str!("../../flows/find_govt_schemes.yaml")),
    ("get_market_price.yaml", include_str!("../../flows/get_market_price.yaml")),
    ("diagnose_plant.yaml", include_str!("../../flows/diagnose_plant.yaml")),
    ("optimize_crop_rotation.yaml", include_str!("../../flows/optimize_crop_rotation.yaml")),
    ("analyze_farm_data.yaml", include_str!("../../flows/analyze_farm_data.yaml")),
    ("farm_assistant.yaml", include_str!("../../flows/farm_assistant.yaml")),
];

#[derive(Debug, Default)]
pub struct FlowRegistry {
    flows: HashMap<String, Arc<FlowDefinition>>,
}

impl FlowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in advisory flows.
    pub fn with_builtin_flows() -> Result<Self, FlowError> {
        let mut registry = Self::new();
        for (file, yaml) in BUILTIN_FLOWS {
            let flow = FlowDefinition::from_yaml(yaml).map_err(|e| {
                FlowError::Configuration(format!("built-in flow '{}': {}", file, e))
            })?;
            registry.register(flow)?;
        }
        Ok(registry)
    }

    /// Add a definition. Fails without modifying the registry if the name is
    /// taken or the template names a field the input schema lacks.
    pub fn register(&mut self, flow: FlowDefinition) -> Result<(), FlowError> {
        if self.flows.contains_key(flow.name()) {
            return Err(FlowError::Configuration(format!(
                "flow '{}' is already registered",
                flow.name()
            )));
        }
        flow.template()
            .check_against(flow.input_schema())
            .map_err(|e| FlowError::Configuration(format!("flow '{}': {}", flow.name(), e)))?;

        tracing::debug!("[FlowRegistry] Registered flow: {}", flow.name());
        self.flows.insert(flow.name().to_string(), Arc::new(flow));
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<FlowDefinition>, FlowError> {
        self.flows
            .get(name)
            .cloned()
            .ok_or_else(|| FlowError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.flows.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.flows.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Definitions sorted by name.
    pub fn flows(&self) -> Vec<Arc<FlowDefinition>> {
        let mut flows: Vec<_> = self.flows.values().cloned().collect();
        flows.sort_by(|a, b| a.name().cmp(b.name()));
        flows
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    /// Load every `.yaml`/`.yml` flow in a directory. All files are parsed
    /// and checked before any is registered, so a bad file leaves the
    /// registry untouched. A name that is already registered is an error.
    pub fn load_dir(&mut self, dir: impl AsRef<Path>) -> Result<usize, FlowError> {
        let dir = dir.as_ref();
        let staged = stage_dir(dir)?;
        if let Some((path, flow)) = staged.iter().find(|(_, f)| self.contains(f.name())) {
            return Err(FlowError::Configuration(format!(
                "flow '{}' in '{}' is already registered",
                flow.name(),
                path.display()
            )));
        }

        let count = staged.len();
        for (_, flow) in staged {
            tracing::info!("[FlowRegistry] Loaded flow: {}", flow.name());
            self.register(flow)?;
        }
        Ok(count)
    }

    /// Load flows from `~/.krishi/flows` and then `./flows`, skipping
    /// directories that do not exist.
    ///
    /// Files here override registered flows of the same name (built-ins
    /// included), and `./flows` overrides `~/.krishi/flows`.
    pub fn load_default_dirs(&mut self) -> Result<usize, FlowError> {
        let mut search_paths = Vec::new();
        if let Some(home) = dirs::home_dir() {
            search_paths.push(home.join(".krishi").join("flows"));
        }
        search_paths.push(PathBuf::from("flows"));
        self.load_overriding(&search_paths)
    }

    fn load_overriding(&mut self, dirs: &[PathBuf]) -> Result<usize, FlowError> {
        let mut total = 0;
        for dir in dirs.iter().filter(|d| d.is_dir()) {
            let staged = stage_dir(dir)?;
            let n = staged.len();
            for (path, flow) in staged {
                if self.flows.remove(flow.name()).is_some() {
                    tracing::info!(
                        "[FlowRegistry] '{}' overrides flow {}",
                        path.display(),
                        flow.name()
                    );
                }
                self.register(flow)?;
            }
            tracing::info!("[FlowRegistry] Loaded {} flows from '{}'", n, dir.display());
            total += n;
        }
        Ok(total)
    }
}

/// Parse every flow file in `dir`, sorted by path. Duplicate names within
/// the directory are an error.
fn stage_dir(dir: &Path) -> Result<Vec<(PathBuf, FlowDefinition)>, FlowError> {
    if !dir.is_dir() {
        return Err(FlowError::Configuration(format!(
            "Flow directory '{}' does not exist",
            dir.display()
        )));
    }

    let entries = std::fs::read_dir(dir).map_err(|e| {
        FlowError::Configuration(format!("Failed to read directory '{}': {}", dir.display(), e))
    })?;

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry =
            entry.map_err(|e| FlowError::Configuration(format!("Directory entry error: {}", e)))?;
        let path = entry.path();
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if matches!(ext, "yaml" | "yml") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut staged: Vec<(PathBuf, FlowDefinition)> = Vec::with_capacity(paths.len());
    for path in paths {
        let flow = FlowDefinition::from_file(&path)?;
        if staged.iter().any(|(_, f)| f.name() == flow.name()) {
            return Err(FlowError::Configuration(format!(
                "flow '{}' in '{}' is defined twice in '{}'",
                flow.name(),
                path.display(),
                dir.display()
            )));
        }
        staged.push((path, flow));
    }
    Ok(staged)
}
