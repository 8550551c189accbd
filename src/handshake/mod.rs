mod digest;

pub use digest::{Scheme, HANDSHAKE_SIZE, RTMP_VERSION};

use crate::{Error, Result};
use self::digest::{make_s1, make_s2, verify_c1};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Serve the C0/C1/C2 ↔ S0/S1/S2 exchange on a fresh connection. The peer
/// picks the variant: a zero version field at C1[4..8] selects the simple
/// echo handshake, anything else the digest handshake.
pub async fn server_handshake<R, W>(reader: &mut R, writer: &mut W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut c0c1 = vec![0u8; 1 + HANDSHAKE_SIZE];
    reader
        .read_exact(&mut c0c1)
        .await
        .map_err(|e| Error::handshake(format!("short C0+C1 read: {}", e)))?;

    if c0c1[0] != RTMP_VERSION {
        return Err(Error::handshake(format!(
            "unsupported rtmp version: {}",
            c0c1[0]
        )));
    }

    let peer_version = u32::from_be_bytes([c0c1[5], c0c1[6], c0c1[7], c0c1[8]]);
    if peer_version == 0 {
        debug!("simple handshake");
        simple_handshake(&c0c1, writer).await?;
    } else {
        debug!(peer_version, "complex handshake");
        complex_handshake(&c0c1[1..], writer).await?;
    }

    // C2 is read and discarded in this profile
    let mut c2 = vec![0u8; HANDSHAKE_SIZE];
    reader
        .read_exact(&mut c2)
        .await
        .map_err(|e| Error::handshake(format!("short C2 read: {}", e)))?;
    Ok(())
}

/// S0|S1|S2 where S1 and S2 both echo C1.
async fn simple_handshake<W>(c0c1: &[u8], writer: &mut W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(c0c1).await?;
    writer.write_all(&c0c1[1..]).await?;
    writer.flush().await?;
    Ok(())
}

/// Digest handshake: verify C1, then answer with a digest-bearing S1 and an
/// S2 keyed off the accepted C1 digest.
async fn complex_handshake<W>(c1: &[u8], writer: &mut W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let (start, c1_digest) = verify_c1(c1)?;
    let scheme = if start >= 776 {
        Scheme::Scheme0
    } else {
        Scheme::Scheme1
    };

    let s1 = make_s1(scheme);
    let s2 = make_s2(&c1_digest);

    writer.write_all(&[RTMP_VERSION]).await?;
    writer.write_all(&s1).await?;
    writer.write_all(&s2).await?;
    writer.flush().await?;
    Ok(())
}
