//! Prompt construction for the orchestrator and delegate loops.

use weft_core::types::RemoteFile;

/// Orchestrator system prompt, with the tabular-attachment nudge when the
/// conversation carries files.
pub fn orchestrator_system(files: &[RemoteFile]) -> String {
    let nudge = if files.is_empty() {
        String::new()
    } else {
        let listing = files
            .iter()
            .map(|f| format!("[{}]({})", f.filename, f.url))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "Tabular data has been provided. File(s): {listing}. \
             Use the data-analysis tool to analyze the data."
        )
    };

    format!(
        "You are a helpful assistant. Follow these instructions:\n\
         - Use the search tool to find information.\n\
         - Use the artifact tool to create an artifact/document/report/flash cards, \
           best used to display information in a structured way.\n\
         - Use the data-analysis tool to analyze data, use this when you need to analyze csv data.\n\
         - Never invoke more than one tool at a time.\n\n\
         {nudge}"
    )
}

/// Researcher prompt for the search delegate's inner loop.
pub fn researcher(query: &str) -> String {
    format!(
        "You are an advanced researcher. Here's how you work:\n\
         1. You start by using the date tool to get the current date.\n\
         2. You break down the query into relevant topics and use the search tool \
            to find the most relevant information. The query is: {query} with the current date.\n\
         3. You summarise the information and finish with a plain text answer."
    )
}

/// Structured-summary prompt over the collected sources (serialized JSON).
pub fn summarizer(sources_json: &str) -> String {
    format!(
        "You read vast amounts of information and give a detailed report of the \
         following information in point form.\n\
         Remember to include the source of the information in the report.\n\
         Content: {sources_json}\n\
         Return in plain text, no markdown, no html, no json, no code, no anything else."
    )
}

/// Writer prompt for the artifact delegate's inner loop.
pub fn writer(title: &str, description: &str, plan: &str) -> String {
    format!(
        "You are a writer and you write a detailed report based on the following:\n\
         title: {title}\n\
         description: {description}\n\
         plan: {plan}\n\n\
         Follow these rules:\n\
         - use the markdown format to write the document.\n\
         - write the document following the plan and the description.\n\
         - DO NOT have preambles like \"Sure! Here's the report...\" or anything like that, \
           go straight to the content.\n\
         - If you need to create flash cards, use the flash-card tool to create them."
    )
}

/// Data-analyst prompt for the data-analysis delegate's inner loop.
pub fn analyst(title: &str, description: &str, plan: &str, file_paths: &[String]) -> String {
    format!(
        "You are a data analyst, you are given a title, description, a plan and a \
         list of data files.\n\n\
         The data files are in the following directory:\n\
         {files}\n\n\
         Follow these rules:\n\
         - use pandas to analyze the data\n\
         - read files only from the ./data/ directory\n\
         - Optionally, write results to the results/ directory\n\
         - ALWAYS use print statements to debug your code, or to review results\n\
         - Use print statements to review data from data analysis from pandas\n\n\
         Possible approaches:\n\
         - break down each step of the plan into tasks\n\
         - You can start off by only reading the data files and understanding the data\n\
         - Based on the shape, type of data, you can run your analysis based on the shape of the data\n\n\
         Here is the title, description, and plan:\n\
         title: {title}\n\
         description: {description}\n\
         plan: {plan}\n\n\
         Write code to fulfill the title, description, and plan.",
        files = file_paths.join("\n"),
    )
}
