use redis::aio::MultiplexedConnection;
use redis::Client;
use std::error::Error;
use url::Url;

/// Opens a multiplexed connection to the shared store. A token, when given,
/// becomes the password of the connection URL (user `default` if none is set).
pub async fn connect(
    store_url: &str,
    token: Option<&str>
) -> Result<MultiplexedConnection, Box<dyn Error + Send + Sync>> {
    let url = with_token(store_url, token)?;
    let client = Client::open(url.as_str())?;
    let conn = client.get_multiplexed_async_connection().await?;
    Ok(conn)
}

fn with_token(store_url: &str, token: Option<&str>) -> Result<Url, Box<dyn Error + Send + Sync>> {
    let mut url = Url::parse(store_url).map_err(|e|
        format!("Invalid shared store URL: {}", e)
    )?;
    if let Some(token) = token.filter(|t| !t.is_empty()) {
        if url.username().is_empty() {
            url.set_username("default").map_err(|_| "Shared store URL cannot carry credentials")?;
        }
        url.set_password(Some(token)).map_err(|_| "Shared store URL cannot carry credentials")?;
    }
    Ok(url)
}
