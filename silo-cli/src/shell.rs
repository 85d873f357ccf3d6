use silo_core::{
    DeleteObjectOperationOutcome, Engine, GetObjectOperationOutcome, Result,
};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;

/// Interactive command loop. Every valid command runs as its own task;
/// `exit` (or end of input) stops the reader, joins every outstanding
/// task to completion, and only then closes the engine's pool and
/// purges the on-disk directories.
pub async fn run_shell(engine: Arc<Engine>) -> Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    let mut tasks: JoinSet<()> = JoinSet::new();

    loop {
        prompt();
        let Some(line) = lines.next_line().await? else {
            break;
        };

        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.as_slice() {
            ["put", path] => {
                let engine = engine.clone();
                let path = path.to_string();
                tasks.spawn(async move { run_put(engine, path).await });
            }
            ["get", id] => match id.parse::<u64>() {
                Ok(object_id) => {
                    let engine = engine.clone();
                    tasks.spawn(async move { run_get(engine, object_id).await });
                }
                Err(_) => println!("Error: invalid object id: {}", id),
            },
            ["delete", id] => match id.parse::<u64>() {
                Ok(object_id) => {
                    let engine = engine.clone();
                    tasks.spawn(async move { run_delete(engine, object_id).await });
                }
                Err(_) => println!("Error: invalid object id: {}", id),
            },
            ["list"] => {
                let engine = engine.clone();
                tasks.spawn(async move { run_list(engine).await });
            }
            ["exit"] => {
                println!("Exiting...");
                break;
            }
            [] => {}
            _ => println!("Invalid command"),
        }
    }

    // Shutdown ordering: refuse new operations, join every outstanding
    // task to completion, then close the pool underneath them.
    engine.stop_accepting();
    while let Some(joined) = tasks.join_next().await {
        if let Err(error) = joined {
            tracing::error!("command task panicked: {}", error);
        }
    }
    engine.close_pool();
    engine.purge_directories().await?;

    Ok(())
}

fn prompt() {
    print!("Enter a command: ");
    let _ = std::io::stdout().flush();
}

async fn run_put(engine: Arc<Engine>, path: String) {
    match engine.put(&path).await {
        Ok(result) => println!(
            "Stored object {} ({} chunks) from {}",
            result.object_id, result.chunk_count, path
        ),
        Err(error) => println!("Error: put {} failed: {}", path, error),
    }
}

async fn run_get(engine: Arc<Engine>, object_id: u64) {
    match engine.get(object_id).await {
        Ok(GetObjectOperationOutcome::Reconstructed(result)) => println!(
            "Reconstructed object {} into {}",
            object_id,
            result.output_path.display()
        ),
        Ok(GetObjectOperationOutcome::NotFound) => {
            println!("Error: object {} not found", object_id)
        }
        Err(error) => println!("Error: get {} failed: {}", object_id, error),
    }
}

async fn run_delete(engine: Arc<Engine>, object_id: u64) {
    match engine.delete(object_id).await {
        Ok(DeleteObjectOperationOutcome::Deleted { chunk_count }) => {
            println!("Deleted object {} ({} chunks)", object_id, chunk_count)
        }
        Ok(DeleteObjectOperationOutcome::NotFound) => {
            println!("Error: object {} not found", object_id)
        }
        Err(error) => println!("Error: delete {} failed: {}", object_id, error),
    }
}

async fn run_list(engine: Arc<Engine>) {
    match engine.list().await {
        Ok(result) => {
            for item in result.items {
                println!("{}: {}", item.object_id, item.source_name);
            }
        }
        Err(error) => println!("Error: list failed: {}", error),
    }
}
