use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use futures::future::join_all;
use std::path::PathBuf;

use notes_sync::notes::{Note, NoteDraft, NotePatch, NoteStore};
use notes_sync::remote::RemoteCollection;

#[derive(Parser, Debug)]
#[command(name = "notes-sync")]
#[command(about = "Create, list, edit and delete notes in a hosted notes table")]
#[command(version)]
pub struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/notes-sync/config.yaml)
  #[arg(short, long, global = true)]
  pub config: Option<PathBuf>,

  /// Backend URL, overriding the config file
  #[arg(long, global = true)]
  pub url: Option<String>,

  /// Use an in-process collection instead of the backend
  #[arg(long, global = true)]
  pub memory: bool,

  /// Also log to stderr
  #[arg(short, long, global = true)]
  pub verbose: bool,

  #[command(subcommand)]
  pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// List notes, newest first
  List,
  /// Create a note
  Create {
    title: String,
    #[arg(long)]
    content: Option<String>,
  },
  /// Change the title and/or content of a note
  Update {
    id: String,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    content: Option<String>,
    /// Fail instead of overwriting if the note changed since it was listed
    #[arg(long)]
    checked: bool,
  },
  /// Delete one or more notes
  Delete {
    #[arg(required = true)]
    ids: Vec<String>,
    /// Fail instead of deleting if a note changed since it was listed
    #[arg(long)]
    checked: bool,
  },
  /// Create, edit and delete a sample note, printing each step
  Demo,
}

/// The message behind the last `None`/`false` result.
fn last_error<R: RemoteCollection<Note>>(store: &NoteStore<R>) -> color_eyre::Report {
  let message = store
    .status()
    .last_error
    .unwrap_or_else(|| "operation failed".to_string());
  eyre!(message)
}

fn print_note(note: &Note) {
  println!(
    "{}  {}  {}",
    note.id,
    note.updated_at.format("%Y-%m-%d %H:%M:%S"),
    note.title
  );
  if let Some(content) = note.content.as_deref().filter(|c| !c.is_empty()) {
    for line in content.lines() {
      println!("    {}", line);
    }
  }
}

pub async fn execute<R: RemoteCollection<Note>>(store: &NoteStore<R>, command: Command) -> Result<()> {
  match command {
    Command::List => {
      let notes = store.list().await.ok_or_else(|| last_error(store))?;
      if notes.is_empty() {
        println!("No notes yet.");
      }
      notes.iter().for_each(print_note);
    }

    Command::Create { title, content } => {
      let note = store
        .create(NoteDraft::new(title, content))
        .await
        .ok_or_else(|| last_error(store))?;
      print_note(&note);
    }

    Command::Update {
      id,
      title,
      content,
      checked,
    } => {
      let patch = NotePatch { title, content };
      let updated = if checked {
        // Checked writes compare against the listed version.
        store.list().await.ok_or_else(|| last_error(store))?;
        store.update_checked(&id, patch).await
      } else {
        store.update(&id, patch).await
      };
      let note = updated.ok_or_else(|| last_error(store))?;
      print_note(&note);
    }

    Command::Delete { ids, checked } => {
      if checked {
        store.list().await.ok_or_else(|| last_error(store))?;
      }

      // Issued together; each result is reported on its own.
      let results = join_all(ids.iter().map(|id| async move {
        let result = if checked {
          store.try_delete_checked(id).await
        } else {
          store.try_delete(id).await
        };
        (id, result)
      }))
      .await;

      let mut failed = 0;
      for (id, result) in results {
        match result {
          Ok(_) => println!("deleted {}", id),
          Err(e) => {
            eprintln!("failed to delete {}: {}", id, e);
            failed += 1;
          }
        }
      }
      if failed > 0 {
        return Err(eyre!("{} of {} deletes failed", failed, ids.len()));
      }
    }

    Command::Demo => demo(store).await?,
  }

  Ok(())
}

async fn demo<R: RemoteCollection<Note>>(store: &NoteStore<R>) -> Result<()> {
  println!("-- create");
  let note = store
    .create(NoteDraft::new("Groceries", Some("Milk, eggs".to_string())))
    .await
    .ok_or_else(|| last_error(store))?;
  print_note(&note);

  println!("-- list");
  store.list().await.ok_or_else(|| last_error(store))?;
  store.items().iter().for_each(print_note);

  println!("-- update");
  let updated = store
    .update(&note.id, NotePatch::content("Milk"))
    .await
    .ok_or_else(|| last_error(store))?;
  print_note(&updated);

  println!("-- delete");
  if !store.delete(&note.id).await {
    return Err(last_error(store));
  }
  println!("deleted {}", note.id);

  println!("-- empty title");
  if store.create(NoteDraft::new("", None)).await.is_none() {
    println!("rejected: {}", last_error(store));
  }

  Ok(())
}
