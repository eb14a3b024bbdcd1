//! Location string resolution

use crate::store::StoreConnector;
use crate::{
    Destination, Error, Input, LocalFile, Location, Output, Result, S3Object, S3Options, Source,
};
use std::ffi::OsStr;
use std::sync::Arc;

/// Maps location strings onto concrete endpoints
///
/// Nothing is opened or checked here; a missing file or unreachable bucket
/// only surfaces on the first read or write.
#[derive(Clone)]
pub struct Resolver {
    connector: Arc<dyn StoreConnector>,
    options: Arc<S3Options>,
}

impl Resolver {
    pub fn new(connector: impl StoreConnector + 'static, options: S3Options) -> Self {
        Self {
            connector: Arc::new(connector),
            options: Arc::new(options),
        }
    }

    pub fn source(&self, location: impl AsRef<OsStr>) -> Result<Box<dyn Source>> {
        let location = location.as_ref();
        match Location::parse(location) {
            Some(Location::Stdio) => Ok(Box::new(Input::stdin())),
            Some(Location::S3 { bucket, key }) => Ok(Box::new(self.s3_object(bucket, key))),
            Some(Location::Local(path)) => Ok(Box::new(LocalFile::new(path))),
            None => Err(Error::Unresolved {
                role: "source",
                location: location.to_string_lossy().into_owned(),
            }),
        }
    }

    pub fn destination(&self, location: impl AsRef<OsStr>) -> Result<Box<dyn Destination>> {
        let location = location.as_ref();
        match Location::parse(location) {
            Some(Location::Stdio) => Ok(Box::new(Output::stdout())),
            Some(Location::S3 { bucket, key }) => Ok(Box::new(self.s3_object(bucket, key))),
            Some(Location::Local(path)) => Ok(Box::new(LocalFile::new(path))),
            None => Err(Error::Unresolved {
                role: "destination",
                location: location.to_string_lossy().into_owned(),
            }),
        }
    }

    fn s3_object(&self, bucket: String, key: String) -> S3Object {
        S3Object::new(bucket, key, self.connector.clone(), self.options.clone())
    }
}
