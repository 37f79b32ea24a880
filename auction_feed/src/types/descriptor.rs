use serde::{Deserialize, Deserializer, Serialize};

/// One auction as delivered by the discovery stage.
///
/// The upstream feed is not consistent about key names or value types, so
/// deserialization accepts the known aliases and both numeric and string ids
/// and counts.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AuctionDescriptor {
    #[serde(alias = "auctionId", alias = "id", deserialize_with = "id_string")]
    pub auction_id: String,

    #[serde(default, alias = "auctionTitle", alias = "name")]
    pub title: String,

    #[serde(default, alias = "auctionSlug", alias = "url")]
    pub slug: String,

    #[serde(
        default,
        alias = "vehicleCount",
        alias = "totalVehicles",
        alias = "count",
        deserialize_with = "lenient_count"
    )]
    pub vehicle_count: u32,
}

impl AuctionDescriptor {
    pub fn new(auction_id: &str, title: &str, slug: &str, vehicle_count: u32) -> Self {
        Self {
            auction_id: auction_id.to_string(),
            title: title.to_string(),
            slug: slug.to_string(),
            vehicle_count,
        }
    }

    /// The page locator for this auction. Falls back to a slug derived from
    /// the title when the feed did not carry one.
    pub fn locator_slug(&self) -> String {
        if !self.slug.trim().is_empty() {
            return self.slug.trim().to_string();
        }
        self.title.trim().replace(' ', "-").replace('/', "-")
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(serde_json::Number),
    Text(String),
}

fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = NumberOrText::deserialize(deserializer)?;
    let id = match raw {
        NumberOrText::Number(n) => n.to_string(),
        NumberOrText::Text(s) => s.trim().to_string(),
    };
    if id.is_empty() {
        return Err(serde::de::Error::custom("empty auction id"));
    }
    Ok(id)
}

fn lenient_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<NumberOrText>::deserialize(deserializer)?;
    Ok(match raw {
        Some(NumberOrText::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .map(|v| v.min(u32::MAX as u64) as u32)
            .unwrap_or(0),
        Some(NumberOrText::Text(s)) => s.trim().parse().unwrap_or(0),
        None => 0,
    })
}
