//! Registry of tool parsers, keyed by parser id

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use verifix_core::domain::{ExecutionOutcome, ToolConfig};

use crate::domain::{ParseContext, ParseResult, ToolParser};
use crate::infrastructure::parsers::{
    MythrilParser, OyenteParser, SemgrepParser, SlitherParser, SmartCheckParser, SolhintParser,
};

/// Registry for tool parsers. Built once at startup and shared read-only.
pub struct ParserRegistry {
    parsers: HashMap<&'static str, Arc<dyn ToolParser>>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self {
            parsers: HashMap::new(),
        }
    }

    /// Registry holding every bundled parser
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(SlitherParser));
        registry.register(Arc::new(MythrilParser));
        registry.register(Arc::new(SemgrepParser));
        registry.register(Arc::new(SolhintParser));
        registry.register(Arc::new(OyenteParser));
        registry.register(Arc::new(SmartCheckParser));
        registry
    }

    /// Register a parser
    pub fn register(&mut self, parser: Arc<dyn ToolParser>) {
        self.parsers.insert(parser.id(), parser);
    }

    /// Get a parser by id
    pub fn get(&self, id: &str) -> Option<Arc<dyn ToolParser>> {
        self.parsers.get(id).cloned()
    }

    /// Get all registered parser ids
    pub fn registered(&self) -> Vec<&'static str> {
        let mut ids: Vec<_> = self.parsers.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

/// Exit codes treated as benign for `tool`: its declaration wins over the parser defaults
pub fn benign_exit_codes(tool: &ToolConfig, parser: &dyn ToolParser) -> BTreeSet<i32> {
    tool.benign_exit_codes
        .clone()
        .unwrap_or_else(|| parser.default_benign_exit_codes())
}

/// Parse one execution outcome of `tool` with `parser`
pub fn parse_outcome(
    parser: &dyn ToolParser,
    tool: &ToolConfig,
    outcome: &ExecutionOutcome,
) -> ParseResult {
    let benign = benign_exit_codes(tool, parser);
    parser.parse(&ParseContext {
        tool_id: &tool.id,
        outcome,
        output_path: tool.output.as_deref(),
        benign_exit_codes: &benign,
    })
}
