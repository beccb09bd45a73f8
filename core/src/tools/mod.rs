pub mod code;

pub use code::{
    AnalysisReport, CodeSnippet, ExecutionResult, SearchResults, analyze_code, execute_code,
    search_code,
};
