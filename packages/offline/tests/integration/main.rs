mod autosave;
mod blob_store;
mod drafts;
mod support;
