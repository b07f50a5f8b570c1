//! JSON shapes for posts and comments.
//!
//! Authors render as a nested profile for signed-in viewers and as the
//! profile's display name for everyone else.

use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;

use crate::blog::{comments, likes, posts};
use crate::db::models::{Comment, Gender, Post, Profile};
use crate::error::AppResult;
use crate::identity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detail {
    /// Authors as nested profiles
    Full,
    /// Authors as display strings
    Brief,
}

impl Detail {
    pub fn for_viewer(signed_in: bool) -> Self {
        if signed_in {
            Detail::Full
        } else {
            Detail::Brief
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileView {
    pub first_name: String,
    pub last_name: String,
    pub other_name: Option<String>,
    pub email: String,
    pub phone_number: String,
    pub gender: Option<Gender>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
    pub profile_photo: Option<String>,
}

impl From<&Profile> for ProfileView {
    fn from(p: &Profile) -> Self {
        Self {
            first_name: p.first_name.clone(),
            last_name: p.last_name.clone(),
            other_name: p.other_name.clone(),
            email: p.email.clone(),
            phone_number: p.phone_number.clone(),
            gender: p.gender,
            date_of_birth: p.date_of_birth,
            address: p.address.clone(),
            profile_photo: p.profile_photo.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum AuthorView {
    Profile(ProfileView),
    Name(String),
}

impl AuthorView {
    fn new(profile: &Profile, detail: Detail) -> Self {
        match detail {
            Detail::Full => AuthorView::Profile(profile.into()),
            Detail::Brief => AuthorView::Name(profile.to_string()),
        }
    }
}

impl fmt::Display for AuthorView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthorView::Profile(p) => write!(f, "{} {}", p.first_name, p.last_name),
            AuthorView::Name(name) => f.write_str(name),
        }
    }
}

/// A comment as embedded in its post.
#[derive(Debug, Serialize)]
pub struct CommentSummary {
    pub id: i64,
    pub body: String,
    pub author: String,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct PostView {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub cover_photo: Option<String>,
    pub author: AuthorView,
    pub likes: Vec<String>,
    pub likes_count: i64,
    pub comments: Vec<CommentSummary>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize)]
pub struct PostRef {
    pub id: i64,
    pub title: String,
}

#[derive(Debug, Serialize)]
pub struct CommentView {
    pub id: i64,
    pub body: String,
    pub author: AuthorView,
    pub blog_post: PostRef,
    pub created_at: String,
}

/// Looks each profile and post up once per render.
struct Lookup<'a> {
    conn: &'a Connection,
    profiles: HashMap<i64, Profile>,
    posts: HashMap<i64, Post>,
}

impl<'a> Lookup<'a> {
    fn new(conn: &'a Connection) -> Self {
        Self {
            conn,
            profiles: HashMap::new(),
            posts: HashMap::new(),
        }
    }

    fn profile(&mut self, id: i64) -> AppResult<&Profile> {
        if !self.profiles.contains_key(&id) {
            let profile = identity::find_profile(self.conn, id)?;
            self.profiles.insert(id, profile);
        }
        Ok(&self.profiles[&id])
    }

    fn post(&mut self, id: i64) -> AppResult<&Post> {
        if !self.posts.contains_key(&id) {
            let post = posts::get_post(self.conn, id)?;
            self.posts.insert(id, post);
        }
        Ok(&self.posts[&id])
    }
}

pub fn render_posts(
    conn: &Connection,
    posts: Vec<Post>,
    detail: Detail,
) -> AppResult<Vec<PostView>> {
    let mut lookup = Lookup::new(conn);
    posts
        .into_iter()
        .map(|post| render_post_with(&mut lookup, post, detail))
        .collect()
}

pub fn render_post(conn: &Connection, post: Post, detail: Detail) -> AppResult<PostView> {
    render_post_with(&mut Lookup::new(conn), post, detail)
}

fn render_post_with(lookup: &mut Lookup<'_>, post: Post, detail: Detail) -> AppResult<PostView> {
    let conn = lookup.conn;
    let author = AuthorView::new(lookup.profile(post.author_id)?, detail);

    let likers = likes::likers_of_post(conn, post.id)?;
    let comment_rows = comments::comments_for_post(conn, post.id)?;
    let mut embedded = Vec::with_capacity(comment_rows.len());
    for comment in comment_rows {
        embedded.push(CommentSummary {
            author: lookup.profile(comment.author_id)?.to_string(),
            id: comment.id,
            body: comment.body,
            created_at: comment.created_at,
        });
    }

    Ok(PostView {
        id: post.id,
        title: post.title,
        body: post.body,
        cover_photo: post.cover_photo,
        author,
        likes_count: likers.len() as i64,
        likes: likers.iter().map(ToString::to_string).collect(),
        comments: embedded,
        created_at: post.created_at,
        updated_at: post.updated_at,
    })
}

pub fn render_comments(
    conn: &Connection,
    comments: Vec<Comment>,
    detail: Detail,
) -> AppResult<Vec<CommentView>> {
    let mut lookup = Lookup::new(conn);
    comments
        .into_iter()
        .map(|comment| render_comment_with(&mut lookup, comment, detail))
        .collect()
}

pub fn render_comment(
    conn: &Connection,
    comment: Comment,
    detail: Detail,
) -> AppResult<CommentView> {
    render_comment_with(&mut Lookup::new(conn), comment, detail)
}

fn render_comment_with(
    lookup: &mut Lookup<'_>,
    comment: Comment,
    detail: Detail,
) -> AppResult<CommentView> {
    let author = AuthorView::new(lookup.profile(comment.author_id)?, detail);
    let post = lookup.post(comment.post_id)?;
    Ok(CommentView {
        id: comment.id,
        body: comment.body,
        author,
        blog_post: PostRef {
            id: post.id,
            title: post.title.clone(),
        },
        created_at: comment.created_at,
    })
}

impl CommentView {
    /// "Comment by <first> <last> on <title>"
    pub fn label(&self) -> String {
        format!("Comment by {} on {}", self.author, self.blog_post.title)
    }
}
