use engine::context::{Agent, EngineOptions};
use parser::parser::Parser;

/// A parsed program plus a fresh `Agent` ready to run it, so the parse cost
/// can be excluded from an execution-only benchmark (`ParsedScript::new`
/// runs in the setup closure, `run` in the measured closure).
pub struct ParsedScript {
    agent: Agent,
    program: ast::Program,
}

impl ParsedScript {
    pub fn new(source_str: &str, jit_enabled: bool) -> Self {
        let mut parser = Parser::new(source_str).expect("benchmark fixture failed to lex");
        let program = parser.parse_program().expect("benchmark fixture failed to parse");
        let agent = Agent::new(EngineOptions { jit_enabled, ..EngineOptions::default() });
        ParsedScript { agent, program }
    }

    pub fn run(mut self) {
        engine::interpreter::run_program(&mut self.agent, &self.program).expect("benchmark fixture threw");
    }
}
