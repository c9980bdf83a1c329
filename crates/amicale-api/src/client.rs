//! HTTP implementation of [`PersistenceApi`] built on reqwest.

use async_trait::async_trait;
use tracing::debug;

use amicale_shared::constants::CALLER_HEADER;
use amicale_shared::protocol::{
    CreateGroupRequest, EditMessageRequest, ErrorResponse, GroupDeletedResponse,
    MediaUploadResponse, MessageRecord, RegisterUserRequest, SendMessageRequest,
    UpdateGroupRequest, UpdateProfileRequest,
};
use amicale_shared::types::{ChatTarget, GroupId, MessageId, Role, UserId};
use amicale_shared::{Group, Message, User};

use crate::api::PersistenceApi;
use crate::error::{ApiError, Result};

/// Persistence-API client bound to one base URL and one caller identity.
#[derive(Debug, Clone)]
pub struct HttpApi {
    http: reqwest::Client,
    base_url: String,
    caller: UserId,
}

impl HttpApi {
    pub fn new(base_url: impl Into<String>, caller: UserId) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
            caller,
        }
    }

    /// The identity this client acts as.
    pub fn caller(&self) -> UserId {
        self.caller
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, self.url(path))
            .header(CALLER_HEADER, self.caller.to_string())
    }

    /// Turn a non-success response into [`ApiError::Status`], decoding the
    /// server's JSON error body when there is one.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = match response.json::<ErrorResponse>().await {
            Ok(body) => body.error,
            Err(_) => status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string(),
        };
        Err(ApiError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn fetch_message(builder: reqwest::RequestBuilder) -> Result<Message> {
        let record = Self::check(builder.send().await?)
            .await?
            .json::<MessageRecord>()
            .await?;
        Ok(Message::try_from(record)?)
    }

    // -- Endpoints outside the messaging contract ---------------------------

    /// Register a new user (the external registration flow).
    pub async fn register_user(
        &self,
        display_name: &str,
        role: Role,
        club: Option<&str>,
    ) -> Result<User> {
        let body = RegisterUserRequest {
            display_name: display_name.to_string(),
            role,
            club: club.map(str::to_string),
        };
        let response = self
            .http
            .post(self.url("/users"))
            .json(&body)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// Update the caller's profile; `None` fields stay unchanged.
    pub async fn update_profile(&self, update: &UpdateProfileRequest) -> Result<User> {
        let path = format!("/users/{}", self.caller);
        let response = self
            .request(reqwest::Method::PATCH, &path)
            .json(update)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// Upload a media file (profile photos, covers); returns the stored URL.
    pub async fn upload_media(&self, file_name: &str, bytes: Vec<u8>) -> Result<String> {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);
        let response = self
            .request(reqwest::Method::POST, "/media")
            .multipart(form)
            .send()
            .await?;
        let upload: MediaUploadResponse = Self::check(response).await?.json().await?;
        Ok(upload.url)
    }
}

#[async_trait]
impl PersistenceApi for HttpApi {
    async fn list_users(&self) -> Result<Vec<User>> {
        let response = self.request(reqwest::Method::GET, "/users").send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn list_groups(&self) -> Result<Vec<Group>> {
        let response = self.request(reqwest::Method::GET, "/groups").send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn fetch_history(&self, target: ChatTarget) -> Result<Vec<Message>> {
        let builder = self.request(reqwest::Method::GET, "/messages");
        let builder = match target {
            ChatTarget::User(user) => builder.query(&[("recipientId", user.to_string())]),
            ChatTarget::Group(group) => builder.query(&[("groupId", group.to_string())]),
        };
        let records = Self::check(builder.send().await?)
            .await?
            .json::<Vec<MessageRecord>>()
            .await?;
        debug!(%target, count = records.len(), "Fetched history");
        records
            .into_iter()
            .map(|record| Message::try_from(record).map_err(ApiError::from))
            .collect()
    }

    async fn send_message(&self, target: ChatTarget, body: &str) -> Result<Message> {
        let request = SendMessageRequest::new(target, body.to_string());
        Self::fetch_message(self.request(reqwest::Method::POST, "/messages").json(&request)).await
    }

    async fn edit_message(&self, id: MessageId, body: &str) -> Result<Message> {
        let request = EditMessageRequest {
            body: body.to_string(),
        };
        let path = format!("/messages/{id}");
        Self::fetch_message(self.request(reqwest::Method::PATCH, &path).json(&request)).await
    }

    async fn delete_message(&self, id: MessageId) -> Result<Message> {
        let path = format!("/messages/{id}");
        Self::fetch_message(self.request(reqwest::Method::DELETE, &path)).await
    }

    async fn create_group(&self, name: &str, members: &[UserId]) -> Result<Group> {
        let request = CreateGroupRequest {
            name: name.to_string(),
            members: members.to_vec(),
        };
        let response = self
            .request(reqwest::Method::POST, "/groups")
            .json(&request)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn update_group(&self, id: GroupId, name: &str, members: &[UserId]) -> Result<Group> {
        let request = UpdateGroupRequest {
            name: name.to_string(),
            members: members.to_vec(),
        };
        let path = format!("/groups/{id}");
        let response = self
            .request(reqwest::Method::PATCH, &path)
            .json(&request)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn delete_group(&self, id: GroupId) -> Result<usize> {
        // Destructive and cascading; the confirm flag is required by the API.
        let path = format!("/groups/{id}");
        let response = self
            .request(reqwest::Method::DELETE, &path)
            .query(&[("confirm", "true")])
            .send()
            .await?;
        let confirmation: GroupDeletedResponse = Self::check(response).await?.json().await?;
        Ok(confirmation.messages_removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_stripped() {
        let api = HttpApi::new("http://localhost:8080/", UserId::new());
        assert_eq!(api.url("/users"), "http://localhost:8080/users");

        let api = HttpApi::new("http://localhost:8080", UserId::new());
        assert_eq!(api.url("/messages"), "http://localhost:8080/messages");
    }
}
