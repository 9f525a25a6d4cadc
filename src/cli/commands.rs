use clap::Subcommand;

use super::config::ConfigArgs;
use super::patterns::{FeedbackArgs, PatternsArgs};
use super::prefetch::PrefetchArgs;
use super::resolve::{ResolveArgs, TeachArgs};
use super::workflow::WorkflowArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Resolve an instruction against a page fixture
    Resolve(ResolveArgs),

    /// Record the element a step refers to
    Teach(TeachArgs),

    /// Report whether a learned pattern worked
    Feedback(FeedbackArgs),

    /// Inspect and maintain learned patterns
    Patterns(PatternsArgs),

    /// Validate, optimize and walk workflows
    Workflow(WorkflowArgs),

    /// Manage guidepath configuration
    Config(ConfigArgs),

    /// Ask the backend for a selector before the page is loaded
    Prefetch(PrefetchArgs),
}
