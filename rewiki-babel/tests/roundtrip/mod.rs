mod edits;
mod properties;
mod unchanged;
