use crate::database::models::CommentRecord;
use crate::database::repositories::{ActivityRepository, CaseRepository, CommentRepository};
use crate::database::Database;
use crate::error::{require_non_empty, ServiceError, ServiceResult};
use crate::trending::COMMENT_WEIGHT;
use crate::utils::{non_blank, now_utc_iso};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Clone)]
pub struct CommentService {
    database: Database,
}

impl CommentService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub fn add_comment(&self, case_id: &str, input: CreateCommentInput) -> ServiceResult<CommentView> {
        require_non_empty("author user id", &input.author_user_id)?;
        require_non_empty("comment body", &input.body)?;
        let parent_comment_id = non_blank(input.parent_comment_id);

        let record = CommentRecord {
            id: Uuid::new_v4().to_string(),
            case_id: case_id.to_string(),
            author_user_id: input.author_user_id.trim().to_string(),
            body: input.body,
            parent_comment_id,
            upvotes: 0,
            downvotes: 0,
            created_at: now_utc_iso(),
        };

        self.database.transaction(|repos| -> ServiceResult<()> {
            if repos.cases().get(case_id)?.is_none() {
                return Err(ServiceError::not_found(format!("case {case_id} not found")));
            }
            if let Some(parent_id) = &record.parent_comment_id {
                match repos.comments().get(parent_id)? {
                    Some(parent) if parent.case_id == case_id => {}
                    Some(_) => {
                        return Err(ServiceError::validation(format!(
                            "parent comment {parent_id} belongs to a different case"
                        )))
                    }
                    None => {
                        return Err(ServiceError::validation(format!(
                            "parent comment {parent_id} does not exist"
                        )))
                    }
                }
            }
            repos.comments().create(&record)?;
            repos
                .activity()
                .record_interaction(case_id, COMMENT_WEIGHT, &record.created_at)?;
            Ok(())
        })?;

        tracing::debug!(case_id = %case_id, comment_id = %record.id, "comment added");
        Ok(CommentView::from_record(record))
    }

    /// Comments for a case, flat, in creation order.
    pub fn list_comments(&self, case_id: &str) -> ServiceResult<Vec<CommentView>> {
        let records = self
            .database
            .with_repositories(|repos| repos.comments().list_for_case(case_id))?;
        Ok(records.into_iter().map(CommentView::from_record).collect())
    }

    pub fn comment_tree(&self, case_id: &str) -> ServiceResult<Vec<CommentNode>> {
        Ok(build_comment_tree(self.list_comments(case_id)?))
    }
}

/// Deepest nesting level a reply is rendered at. Roots sit at depth 0.
pub const MAX_REPLY_DEPTH: usize = 32;

/// Nests a flat list of comments into a reply forest.
///
/// Children keep their input order. A comment whose parent is not present in
/// `comments` (or that names itself) becomes a root. Members of a parent
/// cycle have no path from any root and are left out. Replies that would
/// land below [`MAX_REPLY_DEPTH`] are attached, in reading order, to their
/// ancestor one level above the cap.
pub fn build_comment_tree(comments: Vec<CommentView>) -> Vec<CommentNode> {
    let index: HashMap<&str, usize> = comments
        .iter()
        .enumerate()
        .map(|(position, comment)| (comment.id.as_str(), position))
        .collect();

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); comments.len()];
    let mut roots = Vec::new();
    for (position, comment) in comments.iter().enumerate() {
        let parent = comment
            .parent_comment_id
            .as_deref()
            .and_then(|parent_id| index.get(parent_id).copied())
            .filter(|parent| *parent != position);
        match parent {
            Some(parent) => children[parent].push(position),
            None => roots.push(position),
        }
    }
    drop(index);

    // Pre-order walk from the roots, deciding where each reply hangs.
    let mut order = Vec::with_capacity(comments.len());
    let mut attached: Vec<Vec<usize>> = vec![Vec::new(); comments.len()];
    let mut stack: Vec<(usize, Option<usize>, usize)> =
        roots.iter().rev().map(|root| (*root, None, 0)).collect();
    while let Some((position, parent, depth)) = stack.pop() {
        order.push(position);
        if let Some(parent) = parent {
            attached[parent].push(position);
        }
        let (child_parent, child_depth) = match parent {
            Some(parent) if depth >= MAX_REPLY_DEPTH => (parent, depth),
            _ => (position, depth + 1),
        };
        for child in children[position].iter().rev() {
            stack.push((*child, Some(child_parent), child_depth));
        }
    }

    // Replies follow their parent in pre-order, so walking backwards builds
    // every node after all of its replies.
    let mut slots: Vec<Option<CommentView>> = comments.into_iter().map(Some).collect();
    let mut built: Vec<Option<CommentNode>> = (0..slots.len()).map(|_| None).collect();
    for position in order.into_iter().rev() {
        let Some(comment) = slots[position].take() else {
            continue;
        };
        let replies = attached[position]
            .iter()
            .filter_map(|reply| built[*reply].take())
            .collect();
        built[position] = Some(CommentNode { comment, replies });
    }
    roots
        .into_iter()
        .filter_map(|root| built[root].take())
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCommentInput {
    pub author_user_id: String,
    pub body: String,
    #[serde(default)]
    pub parent_comment_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentView {
    pub id: String,
    pub case_id: String,
    pub author_user_id: String,
    pub body: String,
    pub parent_comment_id: Option<String>,
    pub upvotes: i64,
    pub downvotes: i64,
    pub created_at: String,
}

impl CommentView {
    fn from_record(record: CommentRecord) -> Self {
        Self {
            id: record.id,
            case_id: record.case_id,
            author_user_id: record.author_user_id,
            body: record.body,
            parent_comment_id: record.parent_comment_id,
            upvotes: record.upvotes,
            downvotes: record.downvotes,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: CommentView,
    pub replies: Vec<CommentNode>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cases::{CaseService, ClinicalFields, CreateCaseInput};
    use crate::database::test_database;

    fn view(id: &str, parent: Option<&str>) -> CommentView {
        CommentView {
            id: id.into(),
            case_id: "case-c".into(),
            author_user_id: "dr-a".into(),
            body: format!("body of {id}"),
            parent_comment_id: parent.map(Into::into),
            upvotes: 0,
            downvotes: 0,
            created_at: "2026-01-01T00:00:00.000Z".into(),
        }
    }

    fn ids(nodes: &[CommentNode]) -> Vec<&str> {
        nodes.iter().map(|node| node.comment.id.as_str()).collect()
    }

    fn count_occurrences(nodes: &[CommentNode], id: &str) -> usize {
        nodes
            .iter()
            .map(|node| {
                usize::from(node.comment.id == id) + count_occurrences(&node.replies, id)
            })
            .sum()
    }

    #[test]
    fn nests_replies_under_parents() {
        let tree = build_comment_tree(vec![
            view("A", None),
            view("B", Some("A")),
            view("D", Some("A")),
            view("E", Some("B")),
        ]);
        assert_eq!(ids(&tree), vec!["A"]);
        assert_eq!(ids(&tree[0].replies), vec!["B", "D"]);
        assert_eq!(ids(&tree[0].replies[0].replies), vec!["E"]);
        assert!(tree[0].replies[1].replies.is_empty());
    }

    #[test]
    fn children_keep_input_order_even_before_parent() {
        let tree = build_comment_tree(vec![
            view("late-child", Some("P")),
            view("P", None),
            view("early-child", Some("P")),
        ]);
        assert_eq!(ids(&tree), vec!["P"]);
        assert_eq!(ids(&tree[0].replies), vec!["late-child", "early-child"]);
    }

    #[test]
    fn unresolvable_parents_are_promoted_to_root() {
        let tree = build_comment_tree(vec![
            view("A", None),
            view("orphan", Some("missing")),
            view("self", Some("self")),
        ]);
        assert_eq!(ids(&tree), vec!["A", "orphan", "self"]);
    }

    #[test]
    fn every_comment_appears_exactly_once() {
        let input = vec![
            view("r1", None),
            view("c1", Some("r1")),
            view("c2", Some("c1")),
            view("o1", Some("gone")),
            view("c3", Some("o1")),
            view("r2", None),
        ];
        let tree = build_comment_tree(input.clone());
        for comment in &input {
            assert_eq!(count_occurrences(&tree, &comment.id), 1, "{}", comment.id);
        }
        let roots = ids(&tree);
        assert_eq!(roots, vec!["r1", "o1", "r2"]);
        assert!(!roots.contains(&"c1"));
    }

    fn depth_of(nodes: &[CommentNode]) -> usize {
        let mut deepest = 0;
        let mut pending: Vec<(&CommentNode, usize)> = nodes.iter().map(|node| (node, 0)).collect();
        while let Some((node, depth)) = pending.pop() {
            deepest = deepest.max(depth);
            pending.extend(node.replies.iter().map(|reply| (reply, depth + 1)));
        }
        deepest
    }

    fn chain(len: usize) -> Vec<CommentView> {
        (0..len)
            .map(|i| {
                let parent = (i > 0).then(|| format!("c{}", i - 1));
                view(&format!("c{i}"), parent.as_deref())
            })
            .collect()
    }

    #[test]
    fn long_reply_chain_is_capped_without_recursing() {
        let input = chain(10_000);
        let tree = build_comment_tree(input.clone());
        assert_eq!(ids(&tree), vec!["c0"]);
        assert_eq!(depth_of(&tree), MAX_REPLY_DEPTH);
        for comment in input.iter().step_by(997) {
            assert_eq!(count_occurrences(&tree, &comment.id), 1, "{}", comment.id);
        }

        let json = serde_json::to_string(&tree).expect("serialize deep tree");
        assert!(json.contains("\"c9999\""));
    }

    #[test]
    fn replies_past_the_cap_attach_to_the_ancestor_above_it() {
        let tree = build_comment_tree(chain(MAX_REPLY_DEPTH + 3));
        let mut node = &tree[0];
        for _ in 0..MAX_REPLY_DEPTH - 1 {
            node = &node.replies[0];
        }
        assert_eq!(node.comment.id, format!("c{}", MAX_REPLY_DEPTH - 1));
        let expected: Vec<String> = (MAX_REPLY_DEPTH..MAX_REPLY_DEPTH + 3)
            .map(|i| format!("c{i}"))
            .collect();
        assert_eq!(ids(&node.replies), expected);
        assert!(node.replies.iter().all(|reply| reply.replies.is_empty()));
    }

    #[test]
    fn empty_input_yields_empty_forest() {
        assert!(build_comment_tree(Vec::new()).is_empty());
    }

    fn setup() -> (CommentService, String) {
        let db = test_database();
        let case = CaseService::new(db.clone())
            .create_case(
                "dr-owner",
                CreateCaseInput {
                    title: "Case C".into(),
                    fields: ClinicalFields::default(),
                    specialties: vec![],
                    media_urls: vec![],
                },
            )
            .expect("create case");
        (CommentService::new(db), case.id)
    }

    fn comment_input(body: &str, parent: Option<&str>) -> CreateCommentInput {
        CreateCommentInput {
            author_user_id: "dr-a".into(),
            body: body.into(),
            parent_comment_id: parent.map(Into::into),
        }
    }

    #[test]
    fn service_builds_tree_from_stored_comments() {
        let (service, case_id) = setup();
        let a = service.add_comment(&case_id, comment_input("A", None)).unwrap();
        let b = service.add_comment(&case_id, comment_input("B", Some(&a.id))).unwrap();
        service.add_comment(&case_id, comment_input("D", Some(&a.id))).unwrap();
        service.add_comment(&case_id, comment_input("E", Some(&b.id))).unwrap();

        let tree = service.comment_tree(&case_id).unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].comment.body, "A");
        let replies: Vec<&str> = tree[0].replies.iter().map(|n| n.comment.body.as_str()).collect();
        assert_eq!(replies, vec!["B", "D"]);
        assert_eq!(tree[0].replies[0].replies[0].comment.body, "E");
    }

    #[test]
    fn parent_must_exist_in_same_case() {
        let (service, case_id) = setup();
        let missing = service.add_comment(&case_id, comment_input("x", Some("nope")));
        assert!(matches!(missing, Err(ServiceError::Validation(_))));
        assert!(service.list_comments(&case_id).unwrap().is_empty());
    }

    #[test]
    fn comment_on_unknown_case_is_not_found() {
        let (service, _) = setup();
        let result = service.add_comment("no-such-case", comment_input("x", None));
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }

    #[test]
    fn blank_body_is_rejected() {
        let (service, case_id) = setup();
        let result = service.add_comment(&case_id, comment_input("  ", None));
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }
}
