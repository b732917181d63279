use std::path::Path;

use tokio::io::{self, AsyncReadExt, AsyncWriteExt};

use super::error::InfraError;

/// Read a whole document from `path`, or from standard input when the path is `-`.
pub async fn read_document(path: &Path) -> Result<String, InfraError> {
    if path.as_os_str() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer).await?;
        return Ok(buffer);
    }

    tokio::fs::read_to_string(path)
        .await
        .map_err(|err| InfraError::input(path.display().to_string(), err))
}

/// Write a rendered document to standard output, ending with a newline.
pub async fn write_document(document: &str) -> Result<(), InfraError> {
    let mut stdout = io::stdout();
    stdout.write_all(document.as_bytes()).await?;
    if !document.ends_with('\n') {
        stdout.write_all(b"\n").await?;
    }
    stdout.flush().await?;
    Ok(())
}
