//! Typed prompt templates.
//!
//! Every template declares the [`Slot`]s it uses. Construction fails if the
//! template text references a variable outside that set (or leaves a
//! declared slot unused), and rendering fails if a declared slot has no
//! value, so a prompt can never silently render with a hole in it.

use std::collections::{BTreeMap, BTreeSet};

use minijinja::Environment;
use thiserror::Error;
use tracing::debug;

use crate::core::types::Message;

const DISPATCHER_SYSTEM: &str = include_str!("prompts/dispatcher_system.md");
const PLAN_GENERATE_SYSTEM: &str = include_str!("prompts/plan_generate_system.md");
const PLAN_GENERATE_USER: &str = include_str!("prompts/plan_generate_user.md");
const PLAN_REFINE_SYSTEM: &str = include_str!("prompts/plan_refine_system.md");
const PLAN_REFINE_USER: &str = include_str!("prompts/plan_refine_user.md");
const REFLECT_SYSTEM: &str = include_str!("prompts/reflect_system.md");
const TOOL_SYSTEM: &str = include_str!("prompts/tool_system.md");
const TOOL_USER: &str = include_str!("prompts/tool_user.md");

/// Named value a template can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Slot {
    Task,
    ExampleInput,
    ExampleSystemPrompt,
    ExampleUserPrompt,
    RetrievedProcedure,
    MaxPlanTreeWidth,
    MaxPlanTreeDepth,
    SubtaskId,
    MaxStep,
    ModifySteps,
    WorkspaceFiles,
    RefineNodeMessage,
    AllPlan,
    TerminalPlan,
    ToolFunctionsDescriptionList,
    ActionProcess,
}

impl Slot {
    pub const ALL: [Slot; 16] = [
        Slot::Task,
        Slot::ExampleInput,
        Slot::ExampleSystemPrompt,
        Slot::ExampleUserPrompt,
        Slot::RetrievedProcedure,
        Slot::MaxPlanTreeWidth,
        Slot::MaxPlanTreeDepth,
        Slot::SubtaskId,
        Slot::MaxStep,
        Slot::ModifySteps,
        Slot::WorkspaceFiles,
        Slot::RefineNodeMessage,
        Slot::AllPlan,
        Slot::TerminalPlan,
        Slot::ToolFunctionsDescriptionList,
        Slot::ActionProcess,
    ];

    /// Variable name used in template text.
    pub fn name(self) -> &'static str {
        match self {
            Slot::Task => "task",
            Slot::ExampleInput => "example_input",
            Slot::ExampleSystemPrompt => "example_system_prompt",
            Slot::ExampleUserPrompt => "example_user_prompt",
            Slot::RetrievedProcedure => "retrieved_procedure",
            Slot::MaxPlanTreeWidth => "max_plan_tree_width",
            Slot::MaxPlanTreeDepth => "max_plan_tree_depth",
            Slot::SubtaskId => "subtask_id",
            Slot::MaxStep => "max_step",
            Slot::ModifySteps => "modify_steps",
            Slot::WorkspaceFiles => "workspace_files",
            Slot::RefineNodeMessage => "refine_node_message",
            Slot::AllPlan => "all_plan",
            Slot::TerminalPlan => "terminal_plan",
            Slot::ToolFunctionsDescriptionList => "tool_functions_description_list",
            Slot::ActionProcess => "action_process",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|slot| slot.name() == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("template {template} does not compile: {detail}")]
    Syntax { template: String, detail: String },
    #[error("template {template} references undeclared variable {variable}")]
    UndeclaredVariable { template: String, variable: String },
    #[error("template {template} declares slot {slot} but never uses it")]
    UnusedSlot { template: String, slot: &'static str },
    #[error("template {template} rendered without a value for slot {slot}")]
    MissingSlot { template: String, slot: &'static str },
    #[error("template {template} failed to render: {detail}")]
    Render { template: String, detail: String },
}

/// Values for template slots. One set may fill several templates; each
/// template reads only its declared slots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotValues {
    values: BTreeMap<Slot, String>,
}

impl SlotValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, slot: Slot, value: impl ToString) -> Self {
        self.set(slot, value);
        self
    }

    pub fn set(&mut self, slot: Slot, value: impl ToString) {
        self.values.insert(slot, value.to_string());
    }

    /// Set `slot` only if it has no value yet.
    pub fn set_default(&mut self, slot: Slot, value: impl ToString) {
        self.values.entry(slot).or_insert_with(|| value.to_string());
    }

    pub fn get(&self, slot: Slot) -> Option<&str> {
        self.values.get(&slot).map(String::as_str)
    }
}

/// A compiled template with a fixed slot set.
#[derive(Debug)]
pub struct PromptTemplate {
    name: &'static str,
    source: &'static str,
    env: Environment<'static>,
    slots: BTreeSet<Slot>,
}

impl PromptTemplate {
    pub fn new(
        name: &'static str,
        source: &'static str,
        slots: &[Slot],
    ) -> Result<Self, TemplateError> {
        let mut env = Environment::new();
        env.add_template(name, source)
            .map_err(|err| TemplateError::Syntax {
                template: name.to_string(),
                detail: err.to_string(),
            })?;
        let slots: BTreeSet<Slot> = slots.iter().copied().collect();

        let referenced = env
            .get_template(name)
            .map_err(|err| TemplateError::Syntax {
                template: name.to_string(),
                detail: err.to_string(),
            })?
            .undeclared_variables(false);
        let mut used = BTreeSet::new();
        let mut variables: Vec<&String> = referenced.iter().collect();
        variables.sort();
        for variable in variables {
            match Slot::from_name(variable).filter(|slot| slots.contains(slot)) {
                Some(slot) => {
                    used.insert(slot);
                }
                None => {
                    return Err(TemplateError::UndeclaredVariable {
                        template: name.to_string(),
                        variable: variable.clone(),
                    });
                }
            }
        }
        if let Some(unused) = slots.difference(&used).next() {
            return Err(TemplateError::UnusedSlot {
                template: name.to_string(),
                slot: unused.name(),
            });
        }

        debug!(template = name, slots = slots.len(), "compiled prompt template");
        Ok(Self {
            name,
            source,
            env,
            slots,
        })
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub fn slots(&self) -> impl Iterator<Item = Slot> + '_ {
        self.slots.iter().copied()
    }

    pub fn render(&self, values: &SlotValues) -> Result<String, TemplateError> {
        let mut context = BTreeMap::new();
        for slot in &self.slots {
            let value = values.get(*slot).ok_or(TemplateError::MissingSlot {
                template: self.name.to_string(),
                slot: slot.name(),
            })?;
            context.insert(slot.name(), value);
        }
        let render_error = |err: minijinja::Error| TemplateError::Render {
            template: self.name.to_string(),
            detail: err.to_string(),
        };
        self.env
            .get_template(self.name)
            .map_err(render_error)?
            .render(context)
            .map_err(render_error)
    }
}

/// System and (optional) user template for one agent.
#[derive(Debug)]
pub struct PromptPair {
    pub system: PromptTemplate,
    pub user: Option<PromptTemplate>,
}

impl PromptPair {
    /// Render into `[system]` or `[system, user]` messages.
    pub fn messages(&self, values: &SlotValues) -> Result<Vec<Message>, TemplateError> {
        let mut messages = vec![Message::system(self.system.render(values)?)];
        if let Some(user) = &self.user {
            messages.push(Message::user(user.render(values)?));
        }
        Ok(messages)
    }

    pub fn dispatcher() -> Result<Self, TemplateError> {
        Ok(Self {
            system: PromptTemplate::new(
                "dispatcher.system",
                DISPATCHER_SYSTEM,
                &[
                    Slot::Task,
                    Slot::ExampleInput,
                    Slot::ExampleSystemPrompt,
                    Slot::ExampleUserPrompt,
                    Slot::RetrievedProcedure,
                ],
            )?,
            user: None,
        })
    }

    pub fn plan_generate() -> Result<Self, TemplateError> {
        Ok(Self {
            system: PromptTemplate::new(
                "plan_generate.system",
                PLAN_GENERATE_SYSTEM,
                &[Slot::MaxPlanTreeWidth, Slot::MaxPlanTreeDepth],
            )?,
            user: Some(PromptTemplate::new(
                "plan_generate.user",
                PLAN_GENERATE_USER,
                &[Slot::Task],
            )?),
        })
    }

    pub fn plan_refine() -> Result<Self, TemplateError> {
        Ok(Self {
            system: PromptTemplate::new(
                "plan_refine.system",
                PLAN_REFINE_SYSTEM,
                &[Slot::MaxPlanTreeWidth, Slot::MaxPlanTreeDepth],
            )?,
            user: Some(PromptTemplate::new(
                "plan_refine.user",
                PLAN_REFINE_USER,
                &[
                    Slot::SubtaskId,
                    Slot::MaxStep,
                    Slot::ModifySteps,
                    Slot::MaxPlanTreeDepth,
                    Slot::WorkspaceFiles,
                    Slot::RefineNodeMessage,
                ],
            )?),
        })
    }

    pub fn reflect() -> Result<Self, TemplateError> {
        Ok(Self {
            system: PromptTemplate::new(
                "reflect.system",
                REFLECT_SYSTEM,
                &[
                    Slot::AllPlan,
                    Slot::TerminalPlan,
                    Slot::ToolFunctionsDescriptionList,
                    Slot::ActionProcess,
                ],
            )?,
            user: None,
        })
    }

    pub fn tool() -> Result<Self, TemplateError> {
        Ok(Self {
            system: PromptTemplate::new(
                "tool.system",
                TOOL_SYSTEM,
                &[
                    Slot::AllPlan,
                    Slot::TerminalPlan,
                    Slot::ToolFunctionsDescriptionList,
                ],
            )?,
            user: Some(PromptTemplate::new(
                "tool.user",
                TOOL_USER,
                &[Slot::WorkspaceFiles, Slot::ActionProcess],
            )?),
        })
    }

    /// Raw system and user text, used as the worked example handed to the
    /// dispatcher.
    pub fn source(&self) -> (&'static str, &'static str) {
        (
            self.system.source,
            self.user.as_ref().map_or("", |user| user.source),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_prompts_compile() {
        for pair in [
            PromptPair::dispatcher(),
            PromptPair::plan_generate(),
            PromptPair::plan_refine(),
            PromptPair::reflect(),
            PromptPair::tool(),
        ] {
            pair.expect("builtin prompt compiles");
        }
    }

    #[test]
    fn undeclared_variable_is_rejected_at_construction() {
        let err = PromptTemplate::new("t", "Hello {{ task }} {{ mystery }}", &[Slot::Task]).unwrap_err();
        assert_eq!(
            err,
            TemplateError::UndeclaredVariable {
                template: "t".to_string(),
                variable: "mystery".to_string(),
            }
        );
    }

    #[test]
    fn known_slot_must_also_be_declared() {
        let err = PromptTemplate::new("t", "{{ task }} {{ max_step }}", &[Slot::Task]).unwrap_err();
        assert!(matches!(err, TemplateError::UndeclaredVariable { ref variable, .. } if variable == "max_step"));
    }

    #[test]
    fn unused_slot_is_rejected() {
        let err = PromptTemplate::new("t", "{{ task }}", &[Slot::Task, Slot::MaxStep]).unwrap_err();
        assert!(matches!(err, TemplateError::UnusedSlot { slot: "max_step", .. }));
    }

    #[test]
    fn render_requires_every_declared_slot() {
        let template =
            PromptTemplate::new("t", "{{ task }} in {{ max_step }} steps", &[Slot::Task, Slot::MaxStep])
                .expect("compile");
        let partial = SlotValues::new().with(Slot::Task, "ship");
        assert!(matches!(
            template.render(&partial),
            Err(TemplateError::MissingSlot { slot: "max_step", .. })
        ));
        let full = partial.with(Slot::MaxStep, 4).with(Slot::AllPlan, "ignored");
        assert_eq!(template.render(&full).expect("render"), "ship in 4 steps");
    }

    #[test]
    fn refine_prompt_renders_limits_and_position() {
        let values = SlotValues::new()
            .with(Slot::MaxPlanTreeWidth, 4)
            .with(Slot::MaxPlanTreeDepth, 3)
            .with(Slot::SubtaskId, "1.2")
            .with(Slot::MaxStep, 4)
            .with(Slot::ModifySteps, 1)
            .with(Slot::WorkspaceFiles, "src/main.rs")
            .with(Slot::RefineNodeMessage, "tests failed");
        let messages = PromptPair::plan_refine()
            .expect("compile")
            .messages(&values)
            .expect("render");
        assert_eq!(messages.len(), 2);
        assert!(messages[0].content.contains("At most 4 subtasks"));
        assert!(messages[1].content.contains("after 1.2"));
        assert!(messages[1].content.contains("tests failed"));
    }

    #[test]
    fn slot_names_round_trip() {
        for slot in Slot::ALL {
            assert_eq!(Slot::from_name(slot.name()), Some(slot));
        }
        assert_eq!(Slot::from_name("nope"), None);
    }
}
