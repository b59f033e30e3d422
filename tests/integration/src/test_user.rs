//! User scenario tests.

#[cfg(test)]
mod tests {
    use http::{Method, StatusCode};
    use s3admin_core::CallContext;
    use s3admin_gateway::IdentityGateway;

    use crate::{TestServer, create_body, test_bucket_name};

    async fn server_with_bucket(prefix: &str) -> (TestServer, String) {
        let server = TestServer::new();
        let bucket = test_bucket_name(prefix);
        let created = server
            .send(Method::POST, "/buckets", Some(create_body(&bucket)))
            .await;
        assert_eq!(created.status, StatusCode::OK);
        (server, bucket)
    }

    #[tokio::test]
    async fn test_should_reset_key_leaving_exactly_one() {
        let (server, bucket) = server_with_bucket("keys").await;

        let created = server
            .send(
                Method::POST,
                &format!("/buckets/{bucket}/users"),
                Some(serde_json::json!({"UserName": "alice"})),
            )
            .await;
        assert_eq!(created.status, StatusCode::OK, "{}", created.json);
        let first_key = created.json["AccessKey"]["AccessKeyId"].as_str().unwrap().to_owned();
        assert!(created.json["AccessKey"]["SecretAccessKey"].is_string());

        let reset = server
            .send(Method::PUT, &format!("/buckets/{bucket}/users/alice"), None)
            .await;
        assert_eq!(reset.status, StatusCode::OK, "{}", reset.json);
        assert_eq!(reset.json["DeletedKeyIds"], serde_json::json!([first_key]));

        let keys = server
            .cloud
            .identity()
            .list_access_keys(&CallContext::default(), "alice")
            .await
            .unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(
            Some(keys[0].access_key_id.as_str()),
            reset.json["AccessKey"]["AccessKeyId"].as_str()
        );
    }

    #[tokio::test]
    async fn test_should_list_show_and_delete_user() {
        let (server, bucket) = server_with_bucket("users").await;
        let users = format!("/buckets/{bucket}/users");
        server
            .send(Method::POST, &users, Some(serde_json::json!({"UserName": "bob"})))
            .await;

        let listed = server.send(Method::GET, &users, None).await;
        assert_eq!(listed.status, StatusCode::OK);
        assert_eq!(listed.json["Users"][0]["UserName"], "bob");

        let shown = server.send(Method::GET, &format!("{users}/bob"), None).await;
        assert_eq!(shown.status, StatusCode::OK);
        assert_eq!(shown.json["Groups"][0]["GroupName"], format!("{bucket}-BktAdmGrp"));

        let deleted = server
            .send(Method::DELETE, &format!("{users}/bob"), None)
            .await;
        assert_eq!(deleted.status, StatusCode::OK, "{}", deleted.json);
        assert!(!server.cloud.identity().has_user("bob"));

        let gone = server.send(Method::GET, &format!("{users}/bob"), None).await;
        assert_eq!(gone.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_should_remove_user_when_group_is_missing() {
        let server = TestServer::new();

        let response = server
            .send(
                Method::POST,
                "/buckets/ghost/users",
                Some(serde_json::json!({"UserName": "carol"})),
            )
            .await;

        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert!(!server.cloud.identity().has_user("carol"));
    }

    #[tokio::test]
    async fn test_should_leave_no_bucket_identity_after_bucket_delete() {
        let (server, bucket) = server_with_bucket("clean").await;
        server
            .send(
                Method::POST,
                &format!("/buckets/{bucket}/users"),
                Some(serde_json::json!({"UserName": "dave"})),
            )
            .await;

        let deleted = server
            .send(Method::DELETE, &format!("/buckets/{bucket}"), None)
            .await;

        assert_eq!(deleted.status, StatusCode::OK);
        assert_eq!(deleted.json["RemovedUsers"], serde_json::json!(["dave"]));
        let iam = server.cloud.identity();
        assert!(!iam.has_group(&format!("{bucket}-BktAdmGrp")));
        assert!(!iam.has_policy(&format!("{bucket}-BktAdmPlc")));
        assert!(iam.group_members(&format!("{bucket}-BktAdmGrp")).is_empty());
    }
}
