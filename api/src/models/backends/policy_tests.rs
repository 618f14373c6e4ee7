//! Wrappers for interacting with policy tests within aclforge

use chrono::Utc;
use tracing::instrument;

use super::db;
use crate::compile::{self, check, resolve};
use crate::models::{
    paginate, ListParams, Page, PolicyTest, PolicyTestCase, PolicyTestRequest, TestRunReport,
};
use crate::utils::{bounder, ApiError, Shared};
use crate::{bad, conn, invalid, not_found};

impl PolicyTest {
    /// Validate and apply a request onto a test shell
    ///
    /// # Arguments
    ///
    /// * `id` - The id this test owns
    /// * `req` - The request to apply
    /// * `shared` - Shared aclforge objects
    async fn from_request(
        id: i64,
        req: PolicyTestRequest,
        shared: &Shared,
    ) -> Result<PolicyTest, ApiError> {
        bounder::string(&req.name, "name", 1, 255)?;
        // make sure the covered policies exist
        db::policies::exists(&req.policies, shared).await?;
        for dynamic_id in &req.dynamic_policies {
            db::dynamic_policies::get(*dynamic_id, shared).await?;
        }
        // give every case its own id
        let start = db::ids::reserve("test_cases", req.cases.len() as i64, shared).await?;
        let cases = req
            .cases
            .into_iter()
            .enumerate()
            .map(|(index, case)| PolicyTestCase {
                id: start + index as i64,
                expected_action: case.expected_action,
                source_network: case.source_network,
                destination_network: case.destination_network,
                source_port: case.source_port,
                destination_port: case.destination_port,
                protocol: case.protocol,
            })
            .collect();
        Ok(PolicyTest {
            id,
            name: req.name,
            comment: req.comment,
            policies: req.policies,
            dynamic_policies: req.dynamic_policies,
            cases,
            created: Utc::now(),
        })
    }

    /// Create a test
    ///
    /// # Arguments
    ///
    /// * `req` - The test create request
    /// * `shared` - Shared aclforge objects
    #[instrument(name = "PolicyTest::create", skip_all, err(Debug))]
    pub async fn create(req: PolicyTestRequest, shared: &Shared) -> Result<PolicyTest, ApiError> {
        let id = db::ids::next("tests", shared).await?;
        let cast = PolicyTest::from_request(id, req, shared).await?;
        db::policy_tests::create(cast, shared).await
    }

    /// Get a test by id
    ///
    /// # Arguments
    ///
    /// * `id` - The id of the test to get
    /// * `shared` - Shared aclforge objects
    #[instrument(name = "PolicyTest::get", skip(shared), err(Debug))]
    pub async fn get(id: i64, shared: &Shared) -> Result<PolicyTest, ApiError> {
        db::policy_tests::get(id, shared).await
    }

    /// List tests
    ///
    /// # Arguments
    ///
    /// * `params` - The filters and ordering to apply
    /// * `shared` - Shared aclforge objects
    #[instrument(name = "PolicyTest::list", skip(shared), err(Debug))]
    pub async fn list(params: ListParams, shared: &Shared) -> Result<Page<PolicyTest>, ApiError> {
        let tests = db::policy_tests::list_all(shared).await?;
        paginate(tests, &params)
    }

    /// Replace a test
    ///
    /// # Arguments
    ///
    /// * `id` - The id of the test to update
    /// * `req` - The request to apply
    /// * `shared` - Shared aclforge objects
    #[instrument(name = "PolicyTest::update", skip_all, fields(id = id), err(Debug))]
    pub async fn update(
        id: i64,
        req: PolicyTestRequest,
        shared: &Shared,
    ) -> Result<PolicyTest, ApiError> {
        let old = db::policy_tests::get(id, shared).await?;
        if req.name != old.name && db::policy_tests::name_taken(&req.name, id, shared).await? {
            return invalid!("name", "A test with this name already exists");
        }
        let mut cast = PolicyTest::from_request(id, req, shared).await?;
        cast.created = old.created;
        let mut pipe = redis::pipe();
        if cast.name != old.name {
            db::policy_tests::build_rename(&mut pipe, &old.name, &cast, shared);
        }
        db::policy_tests::build(&mut pipe, &cast, shared)?;
        let _: () = pipe.atomic().query_async(conn!(shared)).await?;
        Ok(cast)
    }

    /// Delete a test
    ///
    /// # Arguments
    ///
    /// * `id` - The id of the test to delete
    /// * `shared` - Shared aclforge objects
    #[instrument(name = "PolicyTest::delete", skip(shared), err(Debug))]
    pub async fn delete(id: i64, shared: &Shared) -> Result<(), ApiError> {
        let cast = db::policy_tests::get(id, shared).await?;
        let mut pipe = redis::pipe();
        db::policy_tests::build_delete(&mut pipe, &cast, shared);
        let _: () = pipe.atomic().query_async(conn!(shared)).await?;
        Ok(())
    }

    /// Run every test covering a policy or dynamic policy
    ///
    /// # Arguments
    ///
    /// * `policy_id` - The policy to run tests against
    /// * `dynamic_policy_id` - The dynamic policy to run tests against
    /// * `shared` - Shared aclforge objects
    #[instrument(name = "PolicyTest::run", skip(shared), err(Debug))]
    pub async fn run(
        policy_id: Option<i64>,
        dynamic_policy_id: Option<i64>,
        shared: &Shared,
    ) -> Result<TestRunReport, ApiError> {
        let (catalog, tests) =
            futures::try_join!(super::catalog(shared), db::policy_tests::list_all(shared))?;
        // expand or resolve the term list depending on the policy flavor
        let (valid_name, terms, default_action, tests) = match (policy_id, dynamic_policy_id) {
            (Some(policy_id), None) => {
                let policy = match catalog.policies.get(&policy_id) {
                    Some(policy) => policy,
                    None => return not_found!("Policy not found".to_owned()),
                };
                let terms = compile::expand::expand(policy, &catalog)?;
                let tests: Vec<PolicyTest> = tests
                    .into_iter()
                    .filter(|test| test.policies.contains(&policy_id))
                    .collect();
                (policy.valid_name(), terms, None, tests)
            }
            (None, Some(dynamic_policy_id)) => {
                let dynamic = db::dynamic_policies::get(dynamic_policy_id, shared).await?;
                let terms = resolve::resolve(&catalog, &dynamic)?;
                let tests: Vec<PolicyTest> = tests
                    .into_iter()
                    .filter(|test| test.dynamic_policies.contains(&dynamic_policy_id))
                    .collect();
                (dynamic.valid_name(), terms, dynamic.default_action, tests)
            }
            _ => {
                return bad!(
                    "Must include either dynamic_policy_id or policy_id.".to_owned()
                )
            }
        };
        // compile the records and classify every case against them
        let (records, definitions) =
            compile::build_records(&catalog, &valid_name, &terms, default_action)?;
        Ok(check::report(&records, &definitions, &terms, &tests))
    }
}
