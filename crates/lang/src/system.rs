//! System definitions: which agents to start, from which plan sources, and
//! with which run settings.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use mas_core::{AgentName, NoApplicablePolicy, SchedulingPolicy, SelectionPolicy, Term};

use crate::ast::AgentSource;
use crate::error::{ParseResult, SystemError, SystemResult};
use crate::mas2j::{parse_project, ProjectDefinition, MAX_INSTANCES};
use crate::parser::{parse_agent, parse_belief, parse_literal};

/// `[mas]` table of a TOML system file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasSettings {
    pub name: String,
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub max_steps: Option<u64>,
    #[serde(default)]
    pub scheduling: SchedulingPolicy,
    #[serde(default)]
    pub on_no_applicable_plan: NoApplicablePolicy,
}

fn default_environment() -> String {
    "none".to_string()
}

fn default_instances() -> usize {
    1
}

/// `[[agent]]` entry of a TOML system file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub name: String,
    /// Plan file relative to the system file; defaults to `<name>.asl`
    #[serde(default)]
    pub plans: Option<PathBuf>,
    /// Inline agent source, used instead of a plan file
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub beliefs: Vec<String>,
    #[serde(default)]
    pub goals: Vec<String>,
    #[serde(default)]
    pub policy: SelectionPolicy,
    #[serde(default = "default_instances")]
    pub instances: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemDefinition {
    #[serde(rename = "mas")]
    pub settings: MasSettings,
    #[serde(rename = "agent", default)]
    pub agents: Vec<AgentDefinition>,
}

impl SystemDefinition {
    pub fn from_toml(text: &str, path: &Path) -> SystemResult<Self> {
        toml::from_str(text).map_err(|source| SystemError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSpec {
    pub kind: String,
    pub args: Vec<Term>,
}

impl EnvironmentSpec {
    pub fn named(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSettings {
    pub seed: u64,
    pub max_steps: Option<u64>,
    pub scheduling: SchedulingPolicy,
    pub on_no_applicable_plan: NoApplicablePolicy,
}

/// One agent ready to be instantiated.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentBlueprint {
    pub name: AgentName,
    pub source: AgentSource,
    pub policy: SelectionPolicy,
}

/// Fully resolved system: every plan source read and parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedSystem {
    pub name: String,
    pub environment: EnvironmentSpec,
    pub settings: RunSettings,
    pub agents: Vec<AgentBlueprint>,
}

/// Loads a `.toml` or `.mas2j` system file and every agent source it names.
pub fn load(path: &Path) -> SystemResult<LoadedSystem> {
    let text = read(path)?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let system = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => from_definition(SystemDefinition::from_toml(&text, path)?, base)?,
        Some("mas2j") => {
            let project = parse_project(&text).map_err(|source| SystemError::MalformedPlan {
                origin: path.display().to_string(),
                source,
            })?;
            from_project(project, base)?
        }
        _ => return Err(SystemError::UnsupportedFormat(path.to_path_buf())),
    };
    info!(
        system = %system.name,
        agents = system.agents.len(),
        environment = %system.environment.kind,
        "loaded system"
    );
    Ok(system)
}

fn read(path: &Path) -> SystemResult<String> {
    std::fs::read_to_string(path).map_err(|source| SystemError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn instance_names(name: &str, instances: usize) -> SystemResult<Vec<AgentName>> {
    match instances {
        1 => Ok(vec![AgentName::new(name)]),
        n if n == 0 || n > MAX_INSTANCES => Err(SystemError::InvalidInstances {
            agent: name.to_string(),
            count: n,
            max: MAX_INSTANCES,
        }),
        n => Ok((1..=n)
            .map(|i| AgentName::new(format!("{}{}", name, i)))
            .collect()),
    }
}

fn read_source(agent: &str, path: &Path) -> SystemResult<AgentSource> {
    if !path.exists() {
        return Err(SystemError::MissingSource {
            agent: agent.to_string(),
            path: path.to_path_buf(),
        });
    }
    let text = read(path)?;
    parse_agent(&text).map_err(|source| SystemError::MalformedPlan {
        origin: path.display().to_string(),
        source,
    })
}

fn parse_extra(
    agent: &str,
    what: &str,
    items: &[String],
    parse: fn(&str) -> ParseResult<mas_core::Literal>,
) -> SystemResult<Vec<mas_core::Literal>> {
    items
        .iter()
        .map(|item| {
            parse(item).map_err(|source| SystemError::MalformedPlan {
                origin: format!("{} of agent {}", what, agent),
                source,
            })
        })
        .collect()
}

/// Expands agent entries into blueprints, rejecting duplicate names.
fn push_blueprints(
    out: &mut Vec<AgentBlueprint>,
    seen: &mut BTreeSet<AgentName>,
    names: Vec<AgentName>,
    source: AgentSource,
    policy: SelectionPolicy,
) -> SystemResult<()> {
    for name in names {
        if !seen.insert(name.clone()) {
            return Err(SystemError::DuplicateAgent(name.to_string()));
        }
        debug!(agent = %name, plans = source.plans.len(), ?policy, "agent blueprint");
        out.push(AgentBlueprint {
            name,
            source: source.clone(),
            policy,
        });
    }
    Ok(())
}

pub fn from_definition(def: SystemDefinition, base: &Path) -> SystemResult<LoadedSystem> {
    let mut agents = Vec::new();
    let mut seen = BTreeSet::new();

    for agent in &def.agents {
        let mut source = match (&agent.source, &agent.plans) {
            (Some(inline), _) => {
                parse_agent(inline).map_err(|source| SystemError::MalformedPlan {
                    origin: format!("inline source of agent {}", agent.name),
                    source,
                })?
            }
            (None, Some(plans)) => read_source(&agent.name, &base.join(plans))?,
            (None, None) => {
                read_source(&agent.name, &base.join(format!("{}.asl", agent.name)))?
            }
        };
        source
            .beliefs
            .extend(parse_extra(&agent.name, "beliefs", &agent.beliefs, parse_belief)?);
        source
            .goals
            .extend(parse_extra(&agent.name, "goals", &agent.goals, parse_literal)?);

        push_blueprints(
            &mut agents,
            &mut seen,
            instance_names(&agent.name, agent.instances)?,
            source,
            agent.policy,
        )?;
    }

    Ok(LoadedSystem {
        name: def.settings.name,
        environment: EnvironmentSpec::named(def.settings.environment),
        settings: RunSettings {
            seed: def.settings.seed,
            max_steps: def.settings.max_steps,
            scheduling: def.settings.scheduling,
            on_no_applicable_plan: def.settings.on_no_applicable_plan,
        },
        agents,
    })
}

pub fn from_project(project: ProjectDefinition, base: &Path) -> SystemResult<LoadedSystem> {
    let source_dir = match &project.source_path {
        Some(dir) => base.join(dir),
        None => base.to_path_buf(),
    };
    let mut agents = Vec::new();
    let mut seen = BTreeSet::new();

    for entry in project.agents {
        let file = entry
            .source
            .clone()
            .unwrap_or_else(|| format!("{}.asl", entry.name));
        let mut source = read_source(&entry.name, &source_dir.join(file))?;
        source.beliefs.extend(entry.beliefs);
        source.goals.extend(entry.goals);

        let policy = match &entry.policy {
            Some(p) => p.parse::<SelectionPolicy>()?,
            None => SelectionPolicy::default(),
        };

        push_blueprints(
            &mut agents,
            &mut seen,
            instance_names(&entry.name, entry.instances)?,
            source,
            policy,
        )?;
    }

    Ok(LoadedSystem {
        name: project.name,
        environment: project
            .environment
            .unwrap_or_else(|| EnvironmentSpec::named("none")),
        settings: RunSettings::default(),
        agents,
    })
}
