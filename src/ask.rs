//! `dqa ask` and `dqa chat` command implementations.
//!
//! Both wire the full question-answering pipeline together: open the
//! store, embed the question, retrieve the top-k chunks, assemble the
//! prompt, and print the answer with its sources. `chat` keeps an
//! in-memory conversation across questions; nothing conversational is
//! ever persisted.

use std::io::{BufRead, Write};

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::llm::create_generator;
use crate::models::ConversationTurn;
use crate::qa::AnswerAssembler;
use crate::retrieve::Retriever;
use crate::store::VectorStore;
use crate::Result;

const EXIT_KEYWORDS: [&str; 4] = ["bye", "exit", "goodbye", "quit"];

/// Answer a single question and print the answer with its sources.
pub async fn run_ask(config: &Config, question: &str, k: Option<usize>) -> Result<()> {
    let store = VectorStore::open(&config.db.path).await?;
    let embedder = create_embedder(&config.embedding)?;
    let generator = create_generator(&config.llm)?;

    let retriever = Retriever::new(&store, embedder.as_ref(), &config.retrieval);
    let assembler = AnswerAssembler::new(generator.as_ref(), &config.prompt);

    let result = retriever.retrieve(question, k).await?;
    let mut history = Vec::new();
    let answer = assembler.answer(question, &mut history, &result.hits).await?;

    println!("{}", answer.text);
    print_sources(&answer.cited_chunk_ids);

    store.close().await;
    Ok(())
}

/// Interactive question loop over stdin.
///
/// `bye`/`exit`/`goodbye`/`quit` (or EOF) ends the session; `reset`
/// clears the conversation. Per-question errors are printed and the
/// loop continues.
pub async fn run_chat(config: &Config, k: Option<usize>) -> Result<()> {
    let store = VectorStore::open(&config.db.path).await?;
    let embedder = create_embedder(&config.embedding)?;
    let generator = create_generator(&config.llm)?;

    let retriever = Retriever::new(&store, embedder.as_ref(), &config.retrieval);
    let assembler = AnswerAssembler::new(generator.as_ref(), &config.prompt);

    let mut history: Vec<ConversationTurn> = Vec::new();
    let stdin = std::io::stdin();

    println!("Ask questions about your documents. Type 'exit' to leave, 'reset' to start over.");
    loop {
        print!("\nQuestion: ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if EXIT_KEYWORDS.contains(&question.to_lowercase().as_str()) {
            println!("Goodbye!");
            break;
        }
        if question.eq_ignore_ascii_case("reset") {
            history.clear();
            println!("Conversation has been reset.");
            continue;
        }

        match answer_once(&retriever, &assembler, &mut history, question, k).await {
            Ok(()) => {}
            Err(e) => eprintln!("error: {}", e),
        }
    }

    store.close().await;
    Ok(())
}

async fn answer_once(
    retriever: &Retriever<'_>,
    assembler: &AnswerAssembler<'_>,
    history: &mut Vec<ConversationTurn>,
    question: &str,
    k: Option<usize>,
) -> Result<()> {
    let result = retriever.retrieve(question, k).await?;
    let answer = assembler.answer(question, history, &result.hits).await?;
    println!("\n{}", answer.text);
    print_sources(&answer.cited_chunk_ids);
    Ok(())
}

fn print_sources(cited: &[String]) {
    if cited.is_empty() {
        return;
    }
    println!("\nSources:");
    for id in cited {
        println!("  {}", id);
    }
}
