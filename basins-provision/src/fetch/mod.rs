//! Téléchargement conditionnel de l'archive
//!
//! Le corps de la réponse est écrit dans `<destination>.part` puis renommé :
//! un transfert interrompu ne laisse jamais un fichier qu'une relance
//! prendrait pour une archive complète.

use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use reqwest::Client;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{NetworkError, ProvisionError};

/// Paramètres du client HTTP
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Durée maximale de la requête complète (transfert compris)
    pub timeout: Duration,
    /// Durée maximale d'établissement de la connexion
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(30),
            user_agent: format!("basins-provision/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Construit le client HTTP
pub fn build_client(settings: &HttpSettings) -> Result<Client, NetworkError> {
    Client::builder()
        .timeout(settings.timeout)
        .connect_timeout(settings.connect_timeout)
        .user_agent(settings.user_agent.as_str())
        .build()
        .map_err(NetworkError::Client)
}

/// Résultat d'un `fetch_if_absent`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// La destination existait déjà, aucune requête émise
    AlreadyPresent,
    /// Archive téléchargée
    Downloaded { bytes: u64 },
}

/// Télécharge `url` vers `destination` uniquement si `destination` n'existe pas
///
/// # Errors
///
/// `ProvisionError::Network` si l'hôte est injoignable ou répond hors 2xx,
/// `ProvisionError::Filesystem` si l'écriture locale échoue.
pub async fn fetch_if_absent(
    client: &Client,
    url: &str,
    destination: &Path,
) -> Result<FetchOutcome, ProvisionError> {
    if destination.exists() {
        debug!(path = %destination.display(), "Archive already present, skipping download");
        return Ok(FetchOutcome::AlreadyPresent);
    }

    let partial = partial_path(destination);

    match download(client, url, &partial).await {
        Ok(bytes) => {
            tokio::fs::rename(&partial, destination)
                .await
                .map_err(|e| ProvisionError::filesystem(destination, e))?;
            info!(url, path = %destination.display(), bytes, "Archive downloaded");
            Ok(FetchOutcome::Downloaded { bytes })
        }
        Err(e) => {
            let _ = tokio::fs::remove_file(&partial).await;
            Err(e)
        }
    }
}

/// Effectue le GET et écrit le corps dans `partial`
async fn download(client: &Client, url: &str, partial: &Path) -> Result<u64, ProvisionError> {
    info!(url, "Downloading archive");

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|source| NetworkError::Request {
            url: url.to_string(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(NetworkError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        }
        .into());
    }

    if let Some(len) = response.content_length() {
        debug!(bytes = len, "Expected size");
    }

    if let Some(parent) = partial.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ProvisionError::filesystem(parent, e))?;
    }

    let mut file = File::create(partial)
        .await
        .map_err(|e| ProvisionError::filesystem(partial, e))?;

    let mut stream = response.bytes_stream();
    let mut total = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk: Bytes = chunk.map_err(|source| NetworkError::Request {
            url: url.to_string(),
            source,
        })?;
        file.write_all(&chunk)
            .await
            .map_err(|e| ProvisionError::filesystem(partial, e))?;
        total += chunk.len() as u64;
    }

    file.flush()
        .await
        .map_err(|e| ProvisionError::filesystem(partial, e))?;
    file.sync_all()
        .await
        .map_err(|e| ProvisionError::filesystem(partial, e))?;

    Ok(total)
}

/// `<destination>.part`
fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}
