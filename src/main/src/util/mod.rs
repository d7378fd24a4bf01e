pub struct JoinHandleWrapper(Option<tokio::task::JoinHandle<()>>);

impl From<tokio::task::JoinHandle<()>> for JoinHandleWrapper {
    fn from(handle: tokio::task::JoinHandle<()>) -> Self {
        Self(handle.into())
    }
}

// TODO: remove unwrap
impl JoinHandleWrapper {
    pub async fn join(&mut self) {
        self.0.take().unwrap().await.unwrap()
    }
}

pub unsafe fn unsafe_mut<T>(arc: &T) -> &mut T {
    unsafe { &mut *(arc as *const T as *mut T) }
}
