//! Bucket scenario tests.

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http::{Method, StatusCode};
    use s3admin_core::CallContext;
    use s3admin_gateway::ObjectGateway;

    use crate::{TestServer, create_body, test_bucket_name};

    #[tokio::test]
    async fn test_should_create_show_and_delete_bucket() {
        let server = TestServer::new();
        let bucket = test_bucket_name("happy");

        let created = server
            .send(Method::POST, "/buckets", Some(create_body(&bucket)))
            .await;
        assert_eq!(created.status, StatusCode::OK, "{}", created.json);
        assert_eq!(created.json["Policy"]["PolicyName"], format!("{bucket}-BktAdmPlc"));
        assert_eq!(created.json["Group"]["GroupName"], format!("{bucket}-BktAdmGrp"));
        assert!(created.json.get("Distribution").is_none());

        let iam = server.cloud.identity();
        assert_eq!(
            iam.group_policy_names(&format!("{bucket}-BktAdmGrp")),
            vec![format!("{bucket}-BktAdmPlc")]
        );

        let head = server
            .send(Method::HEAD, &format!("/buckets/{bucket}"), None)
            .await;
        assert_eq!(head.status, StatusCode::OK);

        let shown = server
            .send(Method::GET, &format!("/buckets/{bucket}"), None)
            .await;
        assert_eq!(shown.status, StatusCode::OK);
        assert_eq!(shown.json["Tags"][0]["Value"], "web");
        assert_eq!(shown.json["Empty"], true);

        let listed = server.send(Method::GET, "/buckets", None).await;
        assert_eq!(listed.json["Buckets"][0]["Name"], bucket.as_str());

        let deleted = server
            .send(Method::DELETE, &format!("/buckets/{bucket}"), None)
            .await;
        assert_eq!(deleted.status, StatusCode::OK, "{}", deleted.json);
        assert_eq!(deleted.json["DeletedPolicies"][0], format!("{bucket}-BktAdmPlc"));
        assert!(deleted.json.get("Errors").is_none());

        assert!(!server.cloud.object().contains(&bucket));
        assert!(!iam.has_group(&format!("{bucket}-BktAdmGrp")));
        assert!(!iam.has_policy(&format!("{bucket}-BktAdmPlc")));
    }

    #[tokio::test]
    async fn test_should_report_conflict_for_existing_bucket() {
        let server = TestServer::new();
        server.cloud.object().set_recreate_owned(true);
        let bucket = test_bucket_name("dup");
        let first = server
            .send(Method::POST, "/buckets", Some(create_body(&bucket)))
            .await;
        assert_eq!(first.status, StatusCode::OK);
        server.cloud.clear_journal();

        let second = server
            .send(Method::POST, "/buckets", Some(create_body(&bucket)))
            .await;

        assert_eq!(second.status, StatusCode::CONFLICT);
        assert_eq!(second.json["Code"], "BucketAlreadyExists");
        assert!(second.json["RequestId"].is_string());
        assert_eq!(server.cloud.journal(), vec!["HeadBucket"]);
        assert!(server.cloud.object().contains(&bucket));
        let iam = server.cloud.identity();
        assert!(iam.has_group(&format!("{bucket}-BktAdmGrp")));
        assert!(iam.has_policy(&format!("{bucket}-BktAdmPlc")));
    }

    #[tokio::test]
    async fn test_should_roll_back_when_group_creation_fails() {
        let server = TestServer::new();
        let bucket = test_bucket_name("fail");
        server.cloud.fail_next("CreateGroup", "LimitExceeded");

        let response = server
            .send(Method::POST, "/buckets", Some(create_body(&bucket)))
            .await;

        assert_eq!(response.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.json["Code"], "LimitExceeded");
        assert_eq!(
            server.cloud.journal(),
            vec![
                "HeadBucket",
                "CreateBucket",
                "PutBucketTagging",
                "CreatePolicy",
                "CreateGroup",
                "DeletePolicy",
                "DeleteBucket",
            ]
        );
        assert!(!server.cloud.object().contains(&bucket));
        assert!(!server.cloud.identity().has_policy(&format!("{bucket}-BktAdmPlc")));

        let metrics = server.metrics().await;
        assert!(metrics.contains("s3admin_saga_rollbacks_total 1"));
        assert!(metrics.contains("s3admin_saga_compensations_total 2"));
        assert!(metrics.contains("operation=\"CreateBucket\",status=\"429\"} 1"));
    }

    #[tokio::test]
    async fn test_should_refuse_to_delete_non_empty_bucket() {
        let server = TestServer::new();
        let bucket = test_bucket_name("full");
        server
            .send(Method::POST, "/buckets", Some(create_body(&bucket)))
            .await;
        server
            .cloud
            .object()
            .put_object(&CallContext::default(), &bucket, "index.html", Bytes::from_static(b"hi"))
            .await
            .unwrap();
        server.cloud.clear_journal();

        let response = server
            .send(Method::DELETE, &format!("/buckets/{bucket}"), None)
            .await;

        assert_eq!(response.status, StatusCode::CONFLICT);
        assert_eq!(response.json["Code"], "BucketNotEmpty");
        assert_eq!(server.cloud.journal(), vec!["DeleteBucket"]);
        assert!(server.cloud.identity().has_group(&format!("{bucket}-BktAdmGrp")));
    }

    #[tokio::test]
    async fn test_should_require_token_for_account_routes() {
        let server = TestServer::new();

        let denied = server
            .raw(Method::GET, "/v1/s3/provider1/buckets", None, None)
            .await;
        assert_eq!(denied.status, StatusCode::UNAUTHORIZED);
        assert_eq!(denied.json["Code"], "Unauthorized");

        let ping = server.raw(Method::GET, "/ping", None, None).await;
        assert_eq!(ping.status, StatusCode::OK);

        let unknown = server.send(Method::GET, "/tables", None).await;
        assert_eq!(unknown.status, StatusCode::NOT_FOUND);

        let other = server
            .raw(Method::GET, "/v1/s3/nobody/buckets", Some(crate::TOKEN), None)
            .await;
        assert_eq!(other.status, StatusCode::NOT_FOUND);
        assert_eq!(other.json["Code"], "NoSuchAccount");
        assert!(server.cloud.journal().is_empty());
    }

    #[tokio::test]
    async fn test_should_reject_malformed_body() {
        let server = TestServer::new();
        let response = server
            .send(Method::POST, "/buckets", Some(serde_json::json!({"Tags": []})))
            .await;

        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.json["Code"], "MalformedJSON");
        assert!(server.cloud.journal().is_empty());
    }
}
