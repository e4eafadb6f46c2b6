//! Bucket handle

use futures::future::join_all;
use tracing::debug;

use crate::robject::{DeleteOptions, Quorum, RObject};
use crate::secondary_index::{IndexOptions, IndexQuery, SecondaryIndex};
use crate::transport::Request;
use crate::{Client, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetOptions {
    pub r: Option<Quorum>,
}

/// A named bucket on a node. Holds a clone of the client handle.
#[derive(Clone)]
pub struct Bucket {
    client: Client,
    name: String,
    allow_mult: bool,
}

impl Bucket {
    pub fn new(client: Client, name: impl Into<String>) -> Self {
        Bucket {
            client,
            name: name.into(),
            allow_mult: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Whether reads may answer with siblings (status 300).
    ///
    /// Only tracked locally; bucket properties are not read from the store.
    pub fn allow_mult(&self) -> bool {
        self.allow_mult
    }

    pub fn with_allow_mult(mut self, allow_mult: bool) -> Self {
        self.allow_mult = allow_mult;
        self
    }

    /// An unsaved object in this bucket.
    pub fn new_object(&self, key: Option<&str>) -> RObject {
        RObject::new(self.clone(), key.map(str::to_string))
    }

    /// Fetch an object. A missing key fails with a 404 `RequestFailed`.
    pub async fn get(&self, key: &str, options: GetOptions) -> Result<RObject> {
        let codes: &[u16] = if self.allow_mult { &[200, 300] } else { &[200] };
        let mut request = Request::get(self.client.object_path(&self.name, Some(key))).expect(codes);
        if let Some(r) = options.r {
            request = request.query("r", r);
        }

        let response = self.client.request(request).await?;
        let mut object = self.new_object(Some(key));
        object.load(&response)?;
        Ok(object)
    }

    /// Fetch several objects concurrently, in key order. Missing keys are
    /// left out.
    pub async fn get_many<S: AsRef<str>>(&self, keys: &[S]) -> Result<Vec<RObject>> {
        let fetches = keys
            .iter()
            .map(|key| self.get(key.as_ref(), GetOptions::default()));

        let mut objects = Vec::with_capacity(keys.len());
        for result in join_all(fetches).await {
            match result {
                Ok(object) => objects.push(object),
                Err(e) if e.is_not_found() => debug!("Skipping missing key in {}", self.name),
                Err(e) => return Err(e),
            }
        }
        Ok(objects)
    }

    /// Delete a key. Succeeds whether or not the key existed.
    pub async fn delete(&self, key: &str, options: DeleteOptions) -> Result<()> {
        let mut request =
            Request::delete(self.client.object_path(&self.name, Some(key))).expect(&[204, 404]);
        if let Some(rw) = options.rw {
            request = request.query("rw", rw);
        }
        self.client.request(request).await?;
        Ok(())
    }

    /// Prepare a secondary index query against this bucket.
    pub fn get_index(
        &self,
        index: &str,
        query: impl Into<IndexQuery>,
        options: IndexOptions,
    ) -> Result<SecondaryIndex> {
        SecondaryIndex::new(self.clone(), index, query, options)
    }
}

impl std::fmt::Debug for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bucket")
            .field("name", &self.name)
            .field("allow_mult", &self.allow_mult)
            .finish()
    }
}
