//! The fixed GraphQL payloads sent to the query endpoint.
//!
//! Every caller-supplied value travels in `variables`, so `serde_json` does all the escaping.

use serde_json::{Value, json};

/// Maximum number of commits requested per page
pub const PAGE_SIZE: u8 = 100;

const PROJECT_QUERY: &str = "
query ProjectMetadata($owner: String!, $name: String!) {
  repository(owner: $owner, name: $name) {
    isFork
    createdAt
  }
}
";

const PROJECT_COMMITS_QUERY: &str = "
query ProjectCommits(
  $owner: String!,
  $name: String!,
  $branch: String!,
  $pageSize: Int!,
  $since: GitTimestamp,
  $after: String
) {
  repository(owner: $owner, name: $name) {
    ref(qualifiedName: $branch) {
      target {
        ... on Commit {
          id
          history(first: $pageSize, since: $since, after: $after) {
            pageInfo {
              endCursor
              hasNextPage
            }
            edges {
              node {
                oid
                commitUrl
                committedDate
                author {
                  date
                  email
                  name
                  user {
                    login
                  }
                }
              }
            }
          }
        }
      }
    }
  }
}
";

const PULL_REQUEST_COMMITS_QUERY: &str = "
query PullRequestCommits(
  $owner: String!,
  $name: String!,
  $number: Int!,
  $pageSize: Int!,
  $after: String
) {
  repository(owner: $owner, name: $name) {
    pullRequest(number: $number) {
      number
      commits(first: $pageSize, after: $after) {
        nodes {
          commit {
            oid
            commitUrl
            committedDate
            author {
              date
              email
              name
              user {
                login
              }
            }
          }
        }
        pageInfo {
          endCursor
          hasNextPage
        }
      }
    }
  }
}
";

/// Creation date and fork flag of a repository.
#[must_use]
pub fn project_query(owner: &str, repo: &str) -> Value {
    json!({
        "query": PROJECT_QUERY,
        "operationName": "ProjectMetadata",
        "variables": {
            "owner": owner,
            "name": repo,
        },
    })
}

/// One page of the commit history of `branch`, optionally bounded by `since` and resumed `after` a cursor.
#[must_use]
pub fn project_commits_query(owner: &str, repo: &str, branch: &str, since: Option<&str>, after: Option<&str>) -> Value {
    json!({
        "query": PROJECT_COMMITS_QUERY,
        "operationName": "ProjectCommits",
        "variables": {
            "owner": owner,
            "name": repo,
            "branch": branch,
            "pageSize": PAGE_SIZE,
            "since": since,
            "after": after,
        },
    })
}

/// One page of the commit list of pull request `number`, optionally resumed `after` a cursor.
#[must_use]
pub fn pull_request_commits_query(owner: &str, repo: &str, number: u64, after: Option<&str>) -> Value {
    json!({
        "query": PULL_REQUEST_COMMITS_QUERY,
        "operationName": "PullRequestCommits",
        "variables": {
            "owner": owner,
            "name": repo,
            "number": number,
            "pageSize": PAGE_SIZE,
            "after": after,
        },
    })
}
