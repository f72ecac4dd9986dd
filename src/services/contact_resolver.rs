use serde::Serialize;
use url::Url;

use crate::models::{Channel, Location, ReviewRequest};

const GOOGLE_WRITE_REVIEW_URL: &str = "https://search.google.com/local/writereview";
const YELP_WRITE_REVIEW_URL: &str = "https://www.yelp.com/writeareview/biz";
const FALLBACK_SEARCH_URL: &str = "https://www.google.com/search";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Review request has neither an email address nor a phone number")]
    MissingContactInfo,
}

/// Where and how a review request is delivered
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedContact {
    pub recipient_label: String,
    pub destination: String,
    pub channel: Channel,
    pub review_link: String,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Picks the channel for a request and the review link it should carry.
///
/// Email takes precedence over SMS when both are present.
pub fn resolve(
    request: &ReviewRequest,
    business_name: &str,
    location: Option<&Location>,
) -> Result<ResolvedContact, ResolveError> {
    let (channel, destination) =
        if let Some(email) = non_blank(request.customer_email.as_deref()) {
            (Channel::Email, email)
        } else if let Some(phone) = non_blank(request.customer_phone.as_deref()) {
            (Channel::Sms, phone)
        } else {
            return Err(ResolveError::MissingContactInfo);
        };

    Ok(ResolvedContact {
        recipient_label: request.customer_name.trim().to_string(),
        destination: destination.to_string(),
        channel,
        review_link: review_link(business_name, location),
    })
}

/// Review link for a location: Google, then Yelp, then a web search
pub fn review_link(business_name: &str, location: Option<&Location>) -> String {
    if let Some(location) = location {
        if let Some(place_id) = non_blank(location.google_place_id.as_deref()) {
            if let Ok(url) = Url::parse_with_params(GOOGLE_WRITE_REVIEW_URL, &[("placeid", place_id)])
            {
                return url.to_string();
            }
        }

        if let Some(business_id) = non_blank(location.yelp_business_id.as_deref()) {
            if let Some(url) = yelp_link(business_id) {
                return url;
            }
        }
    }

    let name = location
        .and_then(|l| non_blank(Some(l.name.as_str())))
        .unwrap_or(business_name);

    let query = format!("{} reviews", name);
    Url::parse_with_params(FALLBACK_SEARCH_URL, &[("q", query.as_str())])
        .map(|url| url.to_string())
        .unwrap_or_else(|_| FALLBACK_SEARCH_URL.to_string())
}

/// The business id always lands as one percent-encoded path segment
fn yelp_link(business_id: &str) -> Option<String> {
    let mut url = Url::parse(YELP_WRITE_REVIEW_URL).ok()?;
    url.path_segments_mut()
        .ok()?
        .pop_if_empty()
        .push(business_id);

    Some(url.to_string())
}
