use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, Sender};
use std::thread;
use thiserror::Error;
use tracing::{error, info};

#[derive(Error, Debug)]
pub enum SaverError {
    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub enum SaverMessage {
    Open(PathBuf),
    Save { path: PathBuf, content: String },
}

#[derive(Debug)]
pub enum SaverResponse {
    Loaded { path: PathBuf, content: String },
    Saved(PathBuf),
    Failed(String),
}

pub struct Saver {
    receiver: Receiver<SaverMessage>,
    response_sender: Sender<SaverResponse>,
}

impl Saver {
    pub fn new(receiver: Receiver<SaverMessage>, response_sender: Sender<SaverResponse>) -> Self {
        Self {
            receiver,
            response_sender,
        }
    }

    pub fn run(&self) {
        while let Ok(message) = self.receiver.recv() {
            let response = match message {
                SaverMessage::Open(path) => match read_file(&path) {
                    Ok(content) => {
                        info!("Loaded {:?}", path);
                        SaverResponse::Loaded { path, content }
                    }
                    Err(e) => {
                        error!("{}", e);
                        SaverResponse::Failed(e.to_string())
                    }
                },
                SaverMessage::Save { path, content } => match write_file(&path, &content) {
                    Ok(()) => {
                        info!("File saved successfully to {:?}", path);
                        SaverResponse::Saved(path)
                    }
                    Err(e) => {
                        error!("{}", e);
                        SaverResponse::Failed(e.to_string())
                    }
                },
            };

            if self.response_sender.send(response).is_err() {
                break;
            }
        }
    }
}

fn read_file(path: &Path) -> Result<String, SaverError> {
    fs::read_to_string(path).map_err(|source| SaverError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn write_file(path: &Path, content: &str) -> Result<(), SaverError> {
    fs::write(path, content).map_err(|source| SaverError::Write {
        path: path.to_path_buf(),
        source,
    })
}

pub fn spawn_saver() -> (Sender<SaverMessage>, Receiver<SaverResponse>) {
    let (sender, receiver) = std::sync::mpsc::channel();
    let (response_sender, response_receiver) = std::sync::mpsc::channel();
    thread::spawn(move || {
        let saver = Saver::new(receiver, response_sender);
        saver.run();
    });
    (sender, response_receiver)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use uuid::Uuid;

    fn setup_test_dir() -> PathBuf {
        let test_dir = std::env::temp_dir().join(format!("test_saver_{}", Uuid::new_v4()));
        fs::create_dir_all(&test_dir).unwrap();
        test_dir
    }

    fn cleanup_test_dir(test_dir: &Path) {
        let _ = fs::remove_dir_all(test_dir);
    }

    #[test]
    fn test_save_then_open() {
        let test_dir = setup_test_dir();
        let file = test_dir.join("draft.txt");
        let (sender, responses) = spawn_saver();

        sender
            .send(SaverMessage::Save {
                path: file.clone(),
                content: "one\ntwo\n".to_string(),
            })
            .unwrap();
        match responses.recv_timeout(Duration::from_secs(5)).unwrap() {
            SaverResponse::Saved(path) => assert_eq!(path, file),
            other => panic!("unexpected response: {:?}", other),
        }

        sender.send(SaverMessage::Open(file.clone())).unwrap();
        match responses.recv_timeout(Duration::from_secs(5)).unwrap() {
            SaverResponse::Loaded { path, content } => {
                assert_eq!(path, file);
                assert_eq!(content, "one\ntwo\n");
            }
            other => panic!("unexpected response: {:?}", other),
        }

        cleanup_test_dir(&test_dir);
    }

    #[test]
    fn test_open_missing_file_fails() {
        let test_dir = setup_test_dir();
        let (sender, responses) = spawn_saver();

        sender
            .send(SaverMessage::Open(test_dir.join("missing.txt")))
            .unwrap();
        let response = responses.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(response, SaverResponse::Failed(ref m) if m.contains("missing.txt")));

        cleanup_test_dir(&test_dir);
    }
}
